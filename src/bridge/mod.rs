//! # Contract Bridge
//!
//! Thin helpers over the blockchain client: a contract handle bound to a
//! signer, transaction confirmation polling, gas estimation, and the EIP-712
//! payload used to authorize decryption.
//!
//! The chain client itself is an external collaborator reached through
//! [`ChainProvider`] and [`TransactionSigner`].

pub mod contract;
pub mod eip712;
pub mod mock;
pub mod rpc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, TxHash};

pub use contract::{function_selector, wait_for_transaction, ContractHandle, TransactionStatus};
pub use eip712::{Eip712Domain, TypedData, TypedField, DECRYPTION_DOMAIN_NAME, DECRYPTION_DOMAIN_VERSION};
pub use mock::MockChain;
pub use rpc::JsonRpcProvider;

/// A contract call or transaction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: u128,
}

/// Mined transaction receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    /// false when the transaction reverted
    pub status: bool,
    pub gas_used: u64,
}

/// Read/write access to an EVM chain
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// RPC URL backing this provider, if it has one
    fn rpc_url(&self) -> Option<String>;

    async fn chain_id(&self) -> Result<u64>;

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64>;

    /// Submit a transaction through the node's account management
    async fn send_transaction(&self, call: &ContractCall) -> Result<TxHash>;

    /// None while the transaction is still pending
    async fn get_transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>>;
}

/// Signer errors. Rejection is kept apart so it can reach the caller as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("user rejected the request: {0}")]
    Rejected(String),

    #[error("signer failed: {0}")]
    Failed(String),
}

/// A connected wallet or key
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign an EIP-712 payload, returning a `0x` hex signature
    async fn sign_typed_data(&self, data: &TypedData) -> std::result::Result<String, SignerError>;
}
