//! # JSON-RPC Provider
//!
//! [`ChainProvider`] over an Ethereum JSON-RPC endpoint.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::{ChainProvider, ContractCall, TransactionReceipt};
use crate::codec;
use crate::types::TxHash;

/// Provider that talks to a node over HTTP JSON-RPC
#[derive(Debug, Clone)]
pub struct JsonRpcProvider {
    rpc_url: Url,
    client: reqwest::Client,
}

impl JsonRpcProvider {
    /// Create a new provider
    pub fn new(rpc_url: &str) -> Result<Self> {
        let rpc_url = Url::parse(rpc_url).context("Failed to parse RPC URL")?;
        Ok(Self {
            rpc_url,
            client: reqwest::Client::new(),
        })
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;

        let response_json: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = response_json.get("error") {
            return Err(anyhow!("{} returned error: {}", method, error));
        }

        response_json
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("No result in {} response", method))
    }
}

/// Transaction object for `eth_call`/`eth_estimateGas`/`eth_sendTransaction`
pub(crate) fn call_object(call: &ContractCall) -> Value {
    let mut object = json!({
        "to": call.to.to_string(),
        "data": codec::bytes_to_hex(&call.data),
    });
    if let Some(from) = call.from {
        object["from"] = json!(from.to_string());
    }
    if call.value > 0 {
        object["value"] = json!(format!("0x{:x}", call.value));
    }
    object
}

/// Parse a hex `QUANTITY` (also accepts plain JSON numbers)
pub(crate) fn parse_quantity(value: &Value) -> Result<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| anyhow!("expected hex quantity, got {}", value))?;
    let digits = codec::strip_prefix(s);
    if digits.is_empty() {
        return Err(anyhow!("empty hex quantity"));
    }
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid hex quantity: {}", s))
}

pub(crate) fn parse_receipt(value: &Value) -> Result<Option<TransactionReceipt>> {
    if value.is_null() {
        return Ok(None);
    }

    let transaction_hash: TxHash = value["transactionHash"]
        .as_str()
        .ok_or_else(|| anyhow!("receipt without transactionHash"))?
        .parse()
        .context("invalid transactionHash")?;

    Ok(Some(TransactionReceipt {
        transaction_hash,
        block_number: parse_quantity(&value["blockNumber"]).context("invalid blockNumber")?,
        status: parse_quantity(&value["status"]).map(|s| s == 1).unwrap_or(false),
        gas_used: parse_quantity(&value["gasUsed"]).unwrap_or(0),
    }))
}

#[async_trait]
impl ChainProvider for JsonRpcProvider {
    fn rpc_url(&self) -> Option<String> {
        Some(self.rpc_url.to_string())
    }

    async fn chain_id(&self) -> Result<u64> {
        let result = self.rpc_call("eth_chainId", json!([])).await?;
        parse_quantity(&result)
    }

    async fn estimate_gas(&self, call: &ContractCall) -> Result<u64> {
        let result = self.rpc_call("eth_estimateGas", json!([call_object(call)])).await?;
        parse_quantity(&result)
    }

    async fn send_transaction(&self, call: &ContractCall) -> Result<TxHash> {
        let result = self.rpc_call("eth_sendTransaction", json!([call_object(call)])).await?;
        let hash = result
            .as_str()
            .ok_or_else(|| anyhow!("eth_sendTransaction returned {}", result))?;
        debug!("eth_sendTransaction -> {}", hash);
        hash.parse().context("invalid transaction hash")
    }

    async fn get_transaction_receipt(&self, tx_hash: &TxHash) -> Result<Option<TransactionReceipt>> {
        let result = self
            .rpc_call("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
            .await?;
        parse_receipt(&result)
    }
}
