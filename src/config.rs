//! # Session Configuration
//!
//! What a session needs to reach the chain, the ACL contract and the gateway.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::bridge::{ChainProvider, JsonRpcProvider};
use crate::types::{Address, SdkError, SdkResult};

/// Known networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Localhost,
    Sepolia,
    Mainnet,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Localhost => 31337,
            Network::Sepolia => 11155111,
            Network::Mainnet => 1,
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Localhost => "http://127.0.0.1:8545",
            Network::Sepolia => "https://ethereum-sepolia-rpc.publicnode.com",
            Network::Mainnet => "https://ethereum-rpc.publicnode.com",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Localhost => write!(f, "localhost"),
            Network::Sepolia => write!(f, "sepolia"),
            Network::Mainnet => write!(f, "mainnet"),
        }
    }
}

impl FromStr for Network {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "localhost" | "local" | "hardhat" => Ok(Network::Localhost),
            "sepolia" => Ok(Network::Sepolia),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(SdkError::Configuration(format!("unknown network: {}", other))),
        }
    }
}

/// Configuration held by exactly one session
#[derive(Clone)]
pub struct SessionConfig {
    /// Chain provider handle
    pub endpoint: Arc<dyn ChainProvider>,
    /// Contract whose public key the session derives
    pub contract_address: Address,
    pub acl_address: Option<Address>,
    pub network: Option<Network>,
    pub gateway_url: Option<Url>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("endpoint", &self.endpoint.rpc_url())
            .field("contract_address", &self.contract_address)
            .field("acl_address", &self.acl_address)
            .field("network", &self.network)
            .field("gateway_url", &self.gateway_url.as_ref().map(Url::as_str))
            .finish()
    }
}

impl SessionConfig {
    pub fn new(endpoint: Arc<dyn ChainProvider>, contract_address: Address) -> Self {
        Self {
            endpoint,
            contract_address,
            acl_address: None,
            network: None,
            gateway_url: None,
        }
    }

    pub fn with_acl_address(mut self, acl_address: Address) -> Self {
        self.acl_address = Some(acl_address);
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_gateway_url(mut self, gateway_url: &str) -> SdkResult<Self> {
        self.gateway_url = Some(parse_http_url(gateway_url)?);
        Ok(self)
    }

    /// Network identifier handed to the FHE library: the endpoint's RPC URL,
    /// else the network tag's default RPC URL
    pub fn network_url(&self) -> Option<String> {
        self.endpoint
            .rpc_url()
            .or_else(|| self.network.map(|n| n.default_rpc_url().to_string()))
    }

    /// Load from environment
    ///
    /// - `FHEVM_CONTRACT_ADDRESS` (required)
    /// - `FHEVM_RPC_URL` (defaults to the network's RPC URL)
    /// - `FHEVM_NETWORK` (`localhost`, `sepolia`, `mainnet`)
    /// - `FHEVM_ACL_ADDRESS`
    /// - `FHEVM_GATEWAY_URL`
    pub fn from_env() -> SdkResult<Self> {
        let contract_address = std::env::var("FHEVM_CONTRACT_ADDRESS")
            .map_err(|_| SdkError::Configuration("FHEVM_CONTRACT_ADDRESS is not set".to_string()))?
            .parse::<Address>()?;

        let network = std::env::var("FHEVM_NETWORK")
            .ok()
            .map(|v| v.parse::<Network>())
            .transpose()?;

        let rpc_url = match std::env::var("FHEVM_RPC_URL") {
            Ok(url) => url,
            Err(_) => {
                let network = network.unwrap_or(Network::Localhost);
                warn!("FHEVM_RPC_URL not set, using {} default RPC", network);
                network.default_rpc_url().to_string()
            }
        };
        let provider = JsonRpcProvider::new(&rpc_url)
            .map_err(|e| SdkError::Configuration(format!("{:#}", e)))?;

        let mut config = SessionConfig::new(Arc::new(provider), contract_address);
        config.network = network;

        if let Ok(acl) = std::env::var("FHEVM_ACL_ADDRESS") {
            config = config.with_acl_address(acl.parse()?);
        }
        if let Ok(gateway) = std::env::var("FHEVM_GATEWAY_URL") {
            config = config.with_gateway_url(&gateway)?;
        }

        Ok(config)
    }
}

fn parse_http_url(url: &str) -> SdkResult<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| SdkError::Configuration(format!("invalid URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(SdkError::Configuration(format!(
            "URL must use http or https, got {}: {}",
            scheme, url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MockChain;

    fn contract() -> Address {
        Address::from_bytes([0x42; 20])
    }

    #[test]
    fn test_network_parsing() {
        assert_eq!("Sepolia".parse::<Network>().unwrap(), Network::Sepolia);
        assert_eq!("localhost".parse::<Network>().unwrap().chain_id(), 31337);
        assert!("ropsten".parse::<Network>().is_err());
        assert_eq!(Network::Mainnet.to_string(), "mainnet");
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new(Arc::new(MockChain::new(1)), contract())
            .with_network(Network::Mainnet)
            .with_acl_address(Address::from_bytes([0x01; 20]))
            .with_gateway_url("https://gateway.example.org")
            .unwrap();

        assert_eq!(config.network, Some(Network::Mainnet));
        assert!(config.acl_address.is_some());
        assert_eq!(config.gateway_url.as_ref().unwrap().host_str(), Some("gateway.example.org"));
    }

    #[test]
    fn test_gateway_url_rejects_other_schemes() {
        let config = SessionConfig::new(Arc::new(MockChain::new(1)), contract());
        assert!(matches!(
            config.clone().with_gateway_url("ftp://gateway"),
            Err(SdkError::Configuration(_))
        ));
        assert!(config.with_gateway_url("gateway").is_err());
    }

    #[test]
    fn test_network_url_fallback() {
        let with_rpc = SessionConfig::new(Arc::new(MockChain::new(1)), contract());
        assert_eq!(with_rpc.network_url().as_deref(), Some("http://127.0.0.1:8545"));

        let bare = Arc::new(MockChain::new(1).with_rpc_url(None));
        let config = SessionConfig::new(bare.clone(), contract());
        assert_eq!(config.network_url(), None);

        let config = SessionConfig::new(bare, contract()).with_network(Network::Sepolia);
        assert_eq!(
            config.network_url().as_deref(),
            Some("https://ethereum-sepolia-rpc.publicnode.com")
        );
    }
}
