// FHE Library Interface - the seam to the external encryption library
//
// The session never touches ciphertext internals. It talks to an FHE library
// through three traits:
// - FheLibrary: creates one instance per network/ACL/gateway configuration
// - FheInstance: derives the contract public key and encrypts single values
// - EncryptedInputBuilder: accumulates typed inputs and produces handles plus
//   one aggregate input proof
//
// Backends:
// - mock: deterministic in-process library for tests and local development
// - tfhe_backend: Zama's tfhe-rs (behind the `fhe` feature)

pub mod mock;

#[cfg(feature = "fhe")]
pub mod tfhe_backend;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Address, KeyMaterial};

pub use mock::{MockFheLibrary, MockInstanceState};

#[cfg(feature = "fhe")]
pub use tfhe_backend::TfheLibrary;

/// Parameters for the instance-creation entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceParams {
    /// Network identifier (RPC URL of the endpoint)
    pub network_url: String,
    /// Chain id when known up front from the network tag
    pub chain_id: Option<u64>,
    pub acl_address: Option<Address>,
    pub gateway_url: Option<String>,
}

/// Output of [`EncryptedInputBuilder::encrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEncryptedInputs {
    /// One opaque handle per added value, in insertion order
    pub handles: Vec<Vec<u8>>,
    /// Aggregate proof over the whole batch
    pub input_proof: Vec<u8>,
}

/// Entry point of an FHE library
#[async_trait]
pub trait FheLibrary: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Create a library instance bound to one network
    async fn create_instance(&self, params: InstanceParams) -> Result<Box<dyn FheInstance>>;
}

/// One initialized library instance
#[async_trait]
pub trait FheInstance: Send + Sync {
    /// Derive the public key and its signature for a contract
    async fn generate_public_key(&self, contract_address: &Address) -> Result<KeyMaterial>;

    fn encrypt_bool(&self, value: bool) -> Result<Vec<u8>>;
    fn encrypt_uint8(&self, value: u8) -> Result<Vec<u8>>;
    fn encrypt_uint16(&self, value: u16) -> Result<Vec<u8>>;
    fn encrypt_uint32(&self, value: u32) -> Result<Vec<u8>>;
    fn encrypt_uint64(&self, value: u64) -> Result<Vec<u8>>;
    fn encrypt_address(&self, value: &Address) -> Result<Vec<u8>>;

    /// Start an input batch bound to (contract, user)
    fn create_encrypted_input(
        &self,
        contract_address: &Address,
        user_address: &Address,
    ) -> Result<Box<dyn EncryptedInputBuilder>>;
}

/// Library-side accumulator for a batch of encrypted inputs
#[async_trait]
pub trait EncryptedInputBuilder: Send {
    fn add_bool(&mut self, value: bool);
    fn add_uint8(&mut self, value: u8);
    fn add_uint16(&mut self, value: u16);
    fn add_uint32(&mut self, value: u32);
    fn add_uint64(&mut self, value: u64);
    fn add_address(&mut self, value: &Address);

    /// Encrypt everything added so far
    async fn encrypt(&mut self) -> Result<RawEncryptedInputs>;
}
