//! # Contract Handles
//!
//! A contract address bound to a provider and a signer, plus confirmation
//! polling for the transactions it sends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::eip712::keccak;
use super::{ChainProvider, ContractCall, TransactionSigner};
use crate::types::{Address, SdkError, SdkResult, TxHash};

/// Transaction finalization status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub is_finalized: bool,
    pub is_successful: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub error_message: Option<String>,
}

/// Contract bound to a signer
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    provider: Arc<dyn ChainProvider>,
    signer: Arc<dyn TransactionSigner>,
}

impl std::fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("signer", &self.signer.address())
            .finish()
    }
}

impl ContractHandle {
    /// Create a new contract handle
    pub fn new(
        address: Address,
        provider: Arc<dyn ChainProvider>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Self {
        Self { address, provider, signer }
    }

    /// Create from hex address string
    pub fn new_from_address(
        address: &str,
        provider: Arc<dyn ChainProvider>,
        signer: Arc<dyn TransactionSigner>,
    ) -> SdkResult<Self> {
        Ok(Self::new(address.parse()?, provider, signer))
    }

    /// Same contract, different signer
    pub fn connect(&self, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            address: self.address,
            provider: self.provider.clone(),
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn provider(&self) -> Arc<dyn ChainProvider> {
        self.provider.clone()
    }

    /// Build a call from the signer to this contract
    pub fn build_call(&self, data: Vec<u8>) -> ContractCall {
        ContractCall {
            from: Some(self.signer.address()),
            to: self.address,
            data,
            value: 0,
        }
    }

    pub async fn estimate_gas(&self, data: Vec<u8>) -> SdkResult<u64> {
        let call = self.build_call(data);
        let gas = self
            .provider
            .estimate_gas(&call)
            .await
            .map_err(|e| SdkError::Chain(format!("Gas estimation failed: {:#}", e)))?;
        debug!("Estimated {} gas for call to {}", gas, self.address);
        Ok(gas)
    }

    pub async fn send(&self, data: Vec<u8>) -> SdkResult<TxHash> {
        let call = self.build_call(data);
        let tx_hash = self
            .provider
            .send_transaction(&call)
            .await
            .map_err(|e| SdkError::Chain(format!("Failed to send transaction: {:#}", e)))?;
        info!("Transaction sent to {}: {}", self.address, tx_hash);
        Ok(tx_hash)
    }

    /// Send and wait until the transaction is mined
    pub async fn send_and_confirm(
        &self,
        data: Vec<u8>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> SdkResult<TransactionStatus> {
        let tx_hash = self.send(data).await?;
        wait_for_transaction(self.provider.as_ref(), &tx_hash, timeout, poll_interval).await
    }
}

/// Check whether a transaction has been mined
pub async fn transaction_status(provider: &dyn ChainProvider, tx_hash: &TxHash) -> TransactionStatus {
    match provider.get_transaction_receipt(tx_hash).await {
        Ok(Some(receipt)) => TransactionStatus {
            is_finalized: true,
            is_successful: receipt.status,
            block_number: Some(receipt.block_number),
            gas_used: Some(receipt.gas_used),
            error_message: if receipt.status {
                None
            } else {
                Some("Transaction reverted".to_string())
            },
        },
        Ok(None) => TransactionStatus {
            is_finalized: false,
            is_successful: false,
            block_number: None,
            gas_used: None,
            error_message: None,
        },
        Err(e) => {
            warn!("Failed to get transaction receipt for {}: {:#}", tx_hash, e);
            TransactionStatus {
                is_finalized: false,
                is_successful: false,
                block_number: None,
                gas_used: None,
                error_message: Some(e.to_string()),
            }
        }
    }
}

/// Wait for a transaction to be mined, with timeout
pub async fn wait_for_transaction(
    provider: &dyn ChainProvider,
    tx_hash: &TxHash,
    timeout: Duration,
    poll_interval: Duration,
) -> SdkResult<TransactionStatus> {
    let start = Instant::now();

    loop {
        let status = transaction_status(provider, tx_hash).await;

        if status.is_finalized {
            if !status.is_successful {
                warn!("Transaction {} reverted", tx_hash);
            }
            return Ok(status);
        }

        if start.elapsed() > timeout {
            return Err(SdkError::Chain(format!(
                "Transaction {} not mined after {:?}",
                tx_hash, timeout
            )));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// First four bytes of `keccak256(signature)`, e.g. `"transfer(address,uint256)"`
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}
