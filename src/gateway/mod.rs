//! # Decryption Gateway
//!
//! The gateway holds (or coordinates) the keys needed to decrypt a
//! ciphertext. User decryption requires an EIP-712 signature from the
//! ciphertext owner; public decryption does not.

mod http;
mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Address, DecryptedValue};

pub use http::HttpGateway;
pub use mock::MockGateway;

/// Authorized user decryption request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRequest {
    /// `0x` hex ciphertext
    pub ciphertext: String,
    /// EIP-712 signature by `user_address`
    pub signature: String,
    pub contract_address: Address,
    pub user_address: Address,
}

/// Public decryption request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDecryptRequest {
    pub ciphertext: String,
    pub contract_address: Address,
}

/// Gateway answer: plaintext plus the gateway's attestation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub decrypted_value: DecryptedValue,
    pub signature: String,
}

#[async_trait]
pub trait DecryptionGateway: Send + Sync {
    async fn user_decrypt(&self, request: GatewayRequest) -> Result<GatewayResponse>;

    async fn public_decrypt(&self, request: PublicDecryptRequest) -> Result<GatewayResponse>;
}
