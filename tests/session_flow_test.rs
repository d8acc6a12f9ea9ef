// Session Flow Integration Tests
// Initialize -> encrypt -> batch -> decrypt against the mock library, chain and gateway

use std::sync::Arc;

use fhevm_client::bridge::{MockChain, DECRYPTION_DOMAIN_NAME};
use fhevm_client::gateway::MockGateway;
use fhevm_client::{
    Address, DecryptedValue, DecryptionRequest, FheSession, FheType, MockFheLibrary, Network,
    SdkError, SessionConfig, SessionRegistry, TypedData, ValidationError,
};
use serde_json::json;

// =============================================================================
// Test Helpers
// =============================================================================

const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

struct Harness {
    session: Arc<FheSession>,
    library: MockFheLibrary,
    chain: Arc<MockChain>,
    gateway: Arc<MockGateway>,
}

fn harness(network: Network) -> Harness {
    let library = MockFheLibrary::new();
    let chain = Arc::new(MockChain::new(network.chain_id()));
    let gateway = Arc::new(MockGateway::new());

    let config = SessionConfig::new(chain.clone(), CONTRACT.parse().unwrap()).with_network(network);
    let session = FheSession::new(config, Arc::new(library.clone()))
        .unwrap()
        .with_signer(chain.clone())
        .with_gateway(gateway.clone());

    Harness {
        session: Arc::new(session),
        library,
        chain,
        gateway,
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_round_trip() {
    fhevm_client::init_tracing();
    let h = harness(Network::Sepolia);

    let keys = h.session.initialize().await.unwrap();
    assert!(keys.public_key.starts_with("0x"));
    assert!(h.session.is_ready());

    let ct = h.session.encrypt_uint32(42).unwrap();
    assert!(fhevm_client::is_valid_encrypted_data(ct.as_bytes()));

    let result = h
        .session
        .user_decrypt(DecryptionRequest {
            ciphertext: ct.into_bytes(),
            contract_address: CONTRACT.parse().unwrap(),
            user_address: h.chain.signer_address(),
        })
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.value, DecryptedValue::Number(42));
    assert_eq!(h.gateway.user_requests().len(), 1);
}

#[tokio::test]
async fn test_everything_fails_before_initialize() {
    let h = harness(Network::Localhost);

    assert!(!h.session.is_ready());
    assert!(matches!(h.session.public_key(), Err(SdkError::Precondition(_))));
    assert!(matches!(h.session.signature(), Err(SdkError::Precondition(_))));
    assert!(matches!(h.session.encrypt_bool(true), Err(SdkError::Precondition(_))));
    assert!(matches!(
        h.session.create_input_batch(Address::ZERO),
        Err(SdkError::Precondition(_))
    ));
    assert!(matches!(
        h.session.public_decrypt(Address::ZERO, &[1]).await,
        Err(SdkError::Precondition(_))
    ));
    assert_eq!(h.library.state().create_calls(), 0);
}

#[tokio::test]
async fn test_failed_reinitialize_drops_previous_keys() {
    let h = harness(Network::Localhost);
    h.session.initialize().await.unwrap();

    h.library.fail_public_key(Some("kms timeout"));
    let err = h.session.initialize().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to initialize FHEVM: kms timeout"
    );
    assert!(!h.session.is_ready());
    assert!(h.session.public_key().is_err());
    assert!(h.session.encrypt_uint8(1).is_err());
}

#[tokio::test]
async fn test_concurrent_initialize_last_completion_wins() {
    let h = harness(Network::Localhost);

    let (a, b) = tokio::join!(h.session.initialize(), h.session.initialize());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.public_key, b.public_key);

    let current = h.session.public_key().unwrap();
    assert!(current == a.public_key || current == b.public_key);
    assert_eq!(h.library.state().create_calls(), 2);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_range_boundaries_through_session() {
    let h = harness(Network::Localhost);
    h.session.initialize().await.unwrap();

    assert!(h.session.encrypt_uint8(0).is_ok());
    assert!(h.session.encrypt_uint8(255).is_ok());
    assert!(h.session.encrypt_uint8(-1).is_err());
    assert!(h.session.encrypt_uint8(256).is_err());
    assert!(h.session.encrypt_uint32(4294967295u64).is_ok());
    assert!(h.session.encrypt_uint32(4294967296u64).is_err());
    assert!(h.session.encrypt_uint64("18446744073709551615").is_ok());
    assert!(h.session.encrypt_uint64("18446744073709551616").is_err());
    assert!(h.session.encrypt(FheType::Bool, "true").is_err());
    assert!(h.session.encrypt_uint16(1.5).is_err());

    let calls = h.library.state().encrypt_calls();
    assert_eq!(calls, 4);
}

#[tokio::test]
async fn test_short_address_never_reaches_library() {
    let h = harness(Network::Localhost);
    h.session.initialize().await.unwrap();

    let err = h.session.encrypt_address("0x123").unwrap_err();
    assert!(matches!(
        err,
        SdkError::Validation(ValidationError::InvalidAddress(_))
    ));
    assert_eq!(h.library.state().encrypt_calls(), 0);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_batch_for_contract_call() {
    let h = harness(Network::Sepolia);
    h.session.initialize().await.unwrap();

    let user = h.chain.signer_address();
    let mut batch = h.session.create_input_batch(user).unwrap();
    assert_eq!(batch.contract_address(), CONTRACT.parse().unwrap());
    assert_eq!(batch.user_address(), user);

    batch.add_uint64(1_000_000u64).unwrap();
    batch.add_bool(false).unwrap();
    batch.add(FheType::Uint8, 9).unwrap();

    let inputs = batch.finalize().await.unwrap();
    assert_eq!(inputs.handles.len(), 3);
    assert_eq!(inputs.handles[0][30], FheType::Uint64.type_byte());
    assert_eq!(inputs.handles[1][30], FheType::Bool.type_byte());
    assert_eq!(inputs.handles[2][30], FheType::Uint8.type_byte());
    assert!(fhevm_client::hex_to_bytes(&inputs.input_proof).is_ok());

    assert!(matches!(batch.finalize().await, Err(SdkError::BatchFinalized)));
}

// =============================================================================
// Decryption
// =============================================================================

#[test]
fn test_eip712_domain_for_sepolia() {
    let contract: Address = CONTRACT.parse().unwrap();
    let user: Address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap();
    let payload = TypedData::decryption(11155111, contract, &[0xab, 0xcd], user);

    let json = payload.to_json();
    assert_eq!(
        json["domain"],
        json!({
            "name": "FHEVM Decryption",
            "version": "1",
            "chainId": 11155111,
            "verifyingContract": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
        })
    );
    assert_eq!(
        json["types"]["Decryption"],
        json!([
            {"name": "ciphertext", "type": "bytes"},
            {"name": "user", "type": "address"},
        ])
    );
    assert_eq!(json["primaryType"], "Decryption");
    assert_eq!(payload.domain.name, DECRYPTION_DOMAIN_NAME);
}

#[tokio::test]
async fn test_wallet_rejection_is_not_wrapped() {
    let h = harness(Network::Sepolia);
    h.session.initialize().await.unwrap();
    h.chain.reject_signatures(true);

    let err = h
        .session
        .user_decrypt(DecryptionRequest {
            ciphertext: vec![1],
            contract_address: CONTRACT.parse().unwrap(),
            user_address: h.chain.signer_address(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SdkError::SignatureRejected("user denied message signature".to_string())
    );
}

#[tokio::test]
async fn test_public_decrypt_address() {
    let h = harness(Network::Localhost);
    h.session.initialize().await.unwrap();

    let ct = h.session.encrypt_address(CONTRACT).unwrap();
    let result = h
        .session
        .public_decrypt(CONTRACT.parse().unwrap(), ct.as_bytes())
        .await
        .unwrap();
    assert_eq!(
        result.value,
        DecryptedValue::Text("0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string())
    );
}

// =============================================================================
// Registry
// =============================================================================

#[tokio::test]
async fn test_registry_hands_out_one_session() {
    let registry = SessionRegistry::new();
    let library = MockFheLibrary::new();
    let chain = Arc::new(MockChain::new(31337));

    let make = || {
        FheSession::new(
            SessionConfig::new(chain.clone(), CONTRACT.parse().unwrap()),
            Arc::new(library.clone()),
        )
    };
    let first = registry.get_or_init(make).await.unwrap();
    let second = registry.get_or_init(make).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(library.state().create_calls(), 1);
}
