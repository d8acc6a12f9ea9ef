//! # FHE Session
//!
//! One session owns one FHE library instance together with the public key
//! and signature derived for the configured contract.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized --initialize() ok--> Ready
//! Uninitialized --initialize() err-> Failed
//! Ready/Failed  --initialize()-----> (repeats the transition)
//! ```
//!
//! Encryption is local and synchronous. Decryption goes through the
//! connected signer (EIP-712 authorization) and the gateway.
//!
//! Calls are not serialized: two overlapping `initialize()` calls both run,
//! and whichever finishes last determines the stored state.

mod batch;
mod registry;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::bridge::{SignerError, TransactionSigner, TypedData};
use crate::codec;
use crate::config::SessionConfig;
use crate::fhe::{FheInstance, FheLibrary, InstanceParams};
use crate::gateway::{DecryptionGateway, GatewayRequest, HttpGateway, PublicDecryptRequest};
use crate::types::{
    Address, DecryptionRequest, DecryptionResult, EncryptedValue, FheType, KeyMaterial, SdkError,
    SdkResult,
};
use crate::validation::{self, RawValue, ValidatedValue};

pub use batch::{EncryptedInputBatch, EncryptedInputs};
pub use registry::{global_registry, SessionRegistry};

/// Observable lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Ready,
    Failed,
}

enum SessionState {
    Uninitialized,
    Ready {
        instance: Arc<dyn FheInstance>,
        keys: KeyMaterial,
    },
    Failed {
        reason: String,
    },
}

/// Client-side FHE session for one contract
pub struct FheSession {
    config: SessionConfig,
    library: Arc<dyn FheLibrary>,
    signer: Option<Arc<dyn TransactionSigner>>,
    gateway: Option<Arc<dyn DecryptionGateway>>,
    state: RwLock<SessionState>,
}

impl std::fmt::Debug for FheSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FheSession")
            .field("config", &self.config)
            .field("library", &self.library.name())
            .field("phase", &self.phase())
            .finish()
    }
}

impl FheSession {
    /// Create an uninitialized session.
    ///
    /// A configured `gateway_url` is used through [`HttpGateway`] unless a
    /// gateway is supplied with [`FheSession::with_gateway`].
    pub fn new(config: SessionConfig, library: Arc<dyn FheLibrary>) -> SdkResult<Self> {
        let gateway: Option<Arc<dyn DecryptionGateway>> = match &config.gateway_url {
            Some(url) => Some(Arc::new(
                HttpGateway::new(url.as_str())
                    .map_err(|e| SdkError::Configuration(format!("{:#}", e)))?,
            )),
            None => None,
        };

        Ok(Self {
            config,
            library,
            signer: None,
            gateway,
            state: RwLock::new(SessionState::Uninitialized),
        })
    }

    /// Signer used to authorize user decryption
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn DecryptionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn contract_address(&self) -> Address {
        self.config.contract_address
    }

    pub fn phase(&self) -> SessionPhase {
        match &*self.state.read() {
            SessionState::Uninitialized => SessionPhase::Uninitialized,
            SessionState::Ready { .. } => SessionPhase::Ready,
            SessionState::Failed { .. } => SessionPhase::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == SessionPhase::Ready
    }

    /// Reason of the last failed initialization
    pub fn failure_reason(&self) -> Option<String> {
        match &*self.state.read() {
            SessionState::Failed { reason } => Some(reason.clone()),
            _ => None,
        }
    }

    /// Create the library instance and derive the contract public key.
    ///
    /// On failure the session holds no instance and no keys; the caller
    /// decides whether to call again.
    pub async fn initialize(&self) -> SdkResult<KeyMaterial> {
        match self.try_initialize().await {
            Ok((instance, keys)) => {
                info!(
                    "FHE session ready for contract {} ({} backend)",
                    self.config.contract_address,
                    self.library.name()
                );
                *self.state.write() = SessionState::Ready {
                    instance,
                    keys: keys.clone(),
                };
                Ok(keys)
            }
            Err(e) => {
                warn!("FHE session initialization failed: {}", e);
                *self.state.write() = SessionState::Failed { reason: e.to_string() };
                Err(e)
            }
        }
    }

    async fn try_initialize(&self) -> SdkResult<(Arc<dyn FheInstance>, KeyMaterial)> {
        let network_url = self.config.network_url().ok_or_else(|| {
            SdkError::Initialization("endpoint has no RPC URL and no network is configured".to_string())
        })?;

        let params = InstanceParams {
            network_url,
            chain_id: self.config.network.map(|n| n.chain_id()),
            acl_address: self.config.acl_address,
            gateway_url: self.config.gateway_url.as_ref().map(|u| u.to_string()),
        };
        debug!("Creating FHE instance with {:?}", params);

        let instance: Arc<dyn FheInstance> = self
            .library
            .create_instance(params)
            .await
            .map_err(|e| SdkError::Initialization(format!("{:#}", e)))?
            .into();

        let keys = instance
            .generate_public_key(&self.config.contract_address)
            .await
            .map_err(|e| SdkError::Initialization(format!("{:#}", e)))?;

        Ok((instance, keys))
    }

    fn instance(&self) -> SdkResult<Arc<dyn FheInstance>> {
        match &*self.state.read() {
            SessionState::Ready { instance, .. } => Ok(instance.clone()),
            _ => Err(SdkError::not_ready()),
        }
    }

    pub fn public_key(&self) -> SdkResult<String> {
        match &*self.state.read() {
            SessionState::Ready { keys, .. } => Ok(keys.public_key.clone()),
            _ => Err(SdkError::not_ready()),
        }
    }

    pub fn signature(&self) -> SdkResult<String> {
        match &*self.state.read() {
            SessionState::Ready { keys, .. } => Ok(keys.signature.clone()),
            _ => Err(SdkError::not_ready()),
        }
    }

    /// Validate `value` as `ty` and encrypt it
    pub fn encrypt(&self, ty: FheType, value: impl Into<RawValue>) -> SdkResult<EncryptedValue> {
        let instance = self.instance()?;
        let value = validation::validate(ty, &value.into())?;
        encrypt_validated(instance.as_ref(), &value)
    }

    pub fn encrypt_bool(&self, value: bool) -> SdkResult<EncryptedValue> {
        self.encrypt(FheType::Bool, value)
    }

    pub fn encrypt_uint8(&self, value: impl Into<RawValue>) -> SdkResult<EncryptedValue> {
        self.encrypt(FheType::Uint8, value)
    }

    pub fn encrypt_uint16(&self, value: impl Into<RawValue>) -> SdkResult<EncryptedValue> {
        self.encrypt(FheType::Uint16, value)
    }

    pub fn encrypt_uint32(&self, value: impl Into<RawValue>) -> SdkResult<EncryptedValue> {
        self.encrypt(FheType::Uint32, value)
    }

    /// Accepts native integers and decimal strings up to 2^64-1
    pub fn encrypt_uint64(&self, value: impl Into<RawValue>) -> SdkResult<EncryptedValue> {
        self.encrypt(FheType::Uint64, value)
    }

    pub fn encrypt_address(&self, value: &str) -> SdkResult<EncryptedValue> {
        self.encrypt(FheType::Address, value)
    }

    /// Start an input batch for `user_address` against the configured contract
    pub fn create_input_batch(&self, user_address: Address) -> SdkResult<EncryptedInputBatch> {
        let instance = self.instance()?;
        let builder = instance
            .create_encrypted_input(&self.config.contract_address, &user_address)
            .map_err(|e| SdkError::Encryption(format!("{:#}", e)))?;
        Ok(EncryptedInputBatch::new(self.config.contract_address, user_address, builder))
    }

    /// Decrypt a ciphertext the user is allowed to read.
    ///
    /// The connected signer signs an EIP-712 `Decryption` payload for the
    /// current chain, and the gateway returns the plaintext.
    pub async fn user_decrypt(&self, request: DecryptionRequest) -> SdkResult<DecryptionResult> {
        self.instance()?;

        let signer = self
            .signer
            .clone()
            .ok_or_else(|| SdkError::Decryption("no signer connected".to_string()))?;
        if signer.address() != request.user_address {
            return Err(SdkError::Decryption(format!(
                "signer {} cannot authorize decryption for {}",
                signer.address(),
                request.user_address
            )));
        }
        let gateway = self.gateway()?;

        let chain_id = self
            .config
            .endpoint
            .chain_id()
            .await
            .map_err(|e| SdkError::Decryption(format!("failed to read chain id: {:#}", e)))?;

        let payload = TypedData::decryption(
            chain_id,
            request.contract_address,
            &request.ciphertext,
            request.user_address,
        );
        debug!(
            "Requesting decryption signature from {} on chain {}",
            signer.address(),
            chain_id
        );

        let signature = signer.sign_typed_data(&payload).await.map_err(|e| match e {
            SignerError::Rejected(reason) => SdkError::SignatureRejected(reason),
            SignerError::Failed(reason) => SdkError::Decryption(reason),
        })?;

        let response = gateway
            .user_decrypt(GatewayRequest {
                ciphertext: codec::bytes_to_hex(&request.ciphertext),
                signature,
                contract_address: request.contract_address,
                user_address: request.user_address,
            })
            .await
            .map_err(|e| SdkError::Decryption(format!("{:#}", e)))?;

        info!("User decryption completed for contract {}", request.contract_address);
        Ok(DecryptionResult {
            value: response.decrypted_value,
            success: true,
        })
    }

    /// Decrypt a publicly decryptable ciphertext; no signature involved
    pub async fn public_decrypt(
        &self,
        contract_address: Address,
        ciphertext: &[u8],
    ) -> SdkResult<DecryptionResult> {
        self.instance()?;
        let gateway = self.gateway()?;

        let response = gateway
            .public_decrypt(PublicDecryptRequest {
                ciphertext: codec::bytes_to_hex(ciphertext),
                contract_address,
            })
            .await
            .map_err(|e| SdkError::Decryption(format!("{:#}", e)))?;

        Ok(DecryptionResult {
            value: response.decrypted_value,
            success: true,
        })
    }

    fn gateway(&self) -> SdkResult<Arc<dyn DecryptionGateway>> {
        self.gateway
            .clone()
            .ok_or_else(|| SdkError::Decryption("no decryption gateway configured".to_string()))
    }
}

fn encrypt_validated(instance: &dyn FheInstance, value: &ValidatedValue) -> SdkResult<EncryptedValue> {
    let bytes = match value {
        ValidatedValue::Bool(v) => instance.encrypt_bool(*v),
        ValidatedValue::Uint8(v) => instance.encrypt_uint8(*v),
        ValidatedValue::Uint16(v) => instance.encrypt_uint16(*v),
        ValidatedValue::Uint32(v) => instance.encrypt_uint32(*v),
        ValidatedValue::Uint64(v) => instance.encrypt_uint64(*v),
        ValidatedValue::Address(v) => instance.encrypt_address(v),
    }
    .map_err(|e| SdkError::Encryption(format!("{:#}", e)))?;

    debug!("Encrypted {} into {} bytes", value.fhe_type(), bytes.len());
    Ok(EncryptedValue::new(bytes))
}
