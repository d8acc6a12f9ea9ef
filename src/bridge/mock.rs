//! In-memory chain used by tests: provider and signer in one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};

use super::eip712::TypedData;
use super::{ChainProvider, ContractCall, SignerError, TransactionReceipt, TransactionSigner};
use crate::codec;
use crate::types::{Address, TxHash};

const DEFAULT_SIGNER: [u8; 20] = [
    0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce, 0x6a, 0xb8, 0x82, 0x72, 0x79, 0xcf,
    0xff, 0xb9, 0x22, 0x66,
];

#[derive(Debug)]
struct PendingTx {
    polls: usize,
    receipt: TransactionReceipt,
}

/// Mock provider + signer
#[derive(Debug)]
pub struct MockChain {
    chain_id: AtomicU64,
    rpc_url: Option<String>,
    signer: Address,
    gas_estimate: u64,
    confirm_after: usize,
    reverts: bool,
    reject_signatures: AtomicBool,
    fail_chain_id: AtomicBool,
    block_number: AtomicU64,
    sent: Mutex<Vec<ContractCall>>,
    pending: Mutex<HashMap<TxHash, PendingTx>>,
    signed: Mutex<Vec<TypedData>>,
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id: AtomicU64::new(chain_id),
            rpc_url: Some("http://127.0.0.1:8545".to_string()),
            signer: Address::from_bytes(DEFAULT_SIGNER),
            gas_estimate: 21_000,
            confirm_after: 0,
            reverts: false,
            reject_signatures: AtomicBool::new(false),
            fail_chain_id: AtomicBool::new(false),
            block_number: AtomicU64::new(1),
            sent: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: Option<&str>) -> Self {
        self.rpc_url = rpc_url.map(str::to_string);
        self
    }

    pub fn with_signer(mut self, signer: Address) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_gas_estimate(mut self, gas: u64) -> Self {
        self.gas_estimate = gas;
        self
    }

    /// Receipts appear after this many polls
    pub fn with_confirmations_after(mut self, polls: usize) -> Self {
        self.confirm_after = polls;
        self
    }

    /// Every mined transaction reports a revert
    pub fn with_reverts(mut self, reverts: bool) -> Self {
        self.reverts = reverts;
        self
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.chain_id.store(chain_id, Ordering::SeqCst);
    }

    /// Simulate the wallet refusing signature prompts
    pub fn reject_signatures(&self, reject: bool) {
        self.reject_signatures.store(reject, Ordering::SeqCst);
    }

    pub fn fail_chain_id(&self, fail: bool) {
        self.fail_chain_id.store(fail, Ordering::SeqCst);
    }

    pub fn signer_address(&self) -> Address {
        self.signer
    }

    pub fn gas_estimate(&self) -> u64 {
        self.gas_estimate
    }

    pub fn sent_calls(&self) -> Vec<ContractCall> {
        self.sent.lock().clone()
    }

    /// Every payload signed so far
    pub fn signed_payloads(&self) -> Vec<TypedData> {
        self.signed.lock().clone()
    }
}

#[async_trait]
impl ChainProvider for MockChain {
    fn rpc_url(&self) -> Option<String> {
        self.rpc_url.clone()
    }

    async fn chain_id(&self) -> Result<u64> {
        if self.fail_chain_id.load(Ordering::SeqCst) {
            return Err(anyhow!("network unreachable"));
        }
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    async fn estimate_gas(&self, _call: &ContractCall) -> Result<u64> {
        Ok(self.gas_estimate)
    }

    async fn send_transaction(&self, call: &ContractCall) -> Result<TxHash> {
        let nonce = {
            let mut sent = self.sent.lock();
            sent.push(call.clone());
            sent.len() as u64
        };

        let mut hasher = Keccak256::new();
        hasher.update(nonce.to_be_bytes());
        hasher.update(call.to.as_bytes());
        hasher.update(&call.data);
        let tx_hash = TxHash(hasher.finalize().into());

        let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.lock().insert(
            tx_hash,
            PendingTx {
                polls: 0,
                receipt: TransactionReceipt {
                    transaction_hash: tx_hash,
                    block_number,
                    status: !self.reverts,
                    gas_used: self.gas_estimate,
                },
            },
        );
        Ok(tx_hash)
    }

    async fn get_transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>> {
        let mut pending = self.pending.lock();
        let tx = pending
            .get_mut(tx_hash)
            .ok_or_else(|| anyhow!("unknown transaction {}", tx_hash))?;

        if tx.polls >= self.confirm_after {
            Ok(Some(tx.receipt.clone()))
        } else {
            tx.polls += 1;
            Ok(None)
        }
    }
}

#[async_trait]
impl TransactionSigner for MockChain {
    fn address(&self) -> Address {
        self.signer
    }

    async fn sign_typed_data(&self, data: &TypedData) -> Result<String, SignerError> {
        if self.reject_signatures.load(Ordering::SeqCst) {
            return Err(SignerError::Rejected("user denied message signature".to_string()));
        }
        self.signed.lock().push(data.clone());

        // Not a real ECDSA signature: digest plus a recovery byte
        let mut signature = data.signing_hash().to_vec();
        signature.extend_from_slice(&Keccak256::digest(self.signer.as_bytes()));
        signature.push(0x1b);
        Ok(codec::bytes_to_hex(&signature))
    }
}
