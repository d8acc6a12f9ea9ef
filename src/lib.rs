//! # fhEVM Client
//!
//! Client-side SDK for fhEVM contracts: encrypt inputs locally, bundle them
//! into proven input batches, and request authorized decryption through a
//! gateway. The FHE math lives in an external library behind [`FheLibrary`];
//! this crate handles validation, session state and the EIP-712 handshake.

pub mod types;
pub mod codec;
pub mod validation;
pub mod config;
pub mod fhe;      // FHE library seam plus mock and tfhe backends
pub mod bridge;   // Chain provider, signer, contract handle, EIP-712
pub mod gateway;  // Decryption gateway collaborator
pub mod session;

#[cfg(feature = "binding")]
pub mod binding;  // Observable state for UI layers

// Re-export commonly used types
pub use types::{
    Address, DecryptedValue, DecryptionRequest, DecryptionResult, EncryptedValue, FheType,
    KeyMaterial, SdkError, SdkResult, TxHash,
};
pub use codec::{bytes_to_hex, hex_to_bytes, is_valid_encrypted_data, CodecError};
pub use validation::{is_valid_address, validate, RawValue, ValidatedValue, ValidationError};
pub use config::{Network, SessionConfig};

pub use fhe::{EncryptedInputBuilder, FheInstance, FheLibrary, InstanceParams, MockFheLibrary};
#[cfg(feature = "fhe")]
pub use fhe::TfheLibrary;

pub use bridge::{
    ChainProvider, ContractHandle, JsonRpcProvider, SignerError, TransactionReceipt,
    TransactionSigner, TypedData,
};
pub use gateway::{DecryptionGateway, HttpGateway};

pub use session::{
    global_registry, EncryptedInputBatch, EncryptedInputs, FheSession, SessionPhase,
    SessionRegistry,
};

#[cfg(feature = "binding")]
pub use binding::{DecryptOperation, EncryptOperation, FheProvider, OperationState, ProviderStatus};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; only the first call installs.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
