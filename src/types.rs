//! # Core Types
//!
//! This module defines the fundamental types shared by the session, the
//! contract bridge and the bindings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::validation::ValidationError;

/// 20-byte EVM account or contract address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Left-pad to a 32-byte ABI word
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", codec::bytes_to_hex(&self.0))
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::validation::parse_address(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 32-byte transaction hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", codec::bytes_to_hex(&self.0))
    }
}

impl FromStr for TxHash {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = codec::hex_to_bytes(s)?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::InvalidLength { expected: 32, actual: bytes.len() })?;
        Ok(Self(array))
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Encrypted type tags understood by the FHE library.
///
/// Discriminants follow the fhEVM handle type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FheType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Address,
}

impl FheType {
    /// Type byte embedded in input handles
    pub fn type_byte(&self) -> u8 {
        match self {
            FheType::Bool => 0,
            FheType::Uint8 => 2,
            FheType::Uint16 => 3,
            FheType::Uint32 => 4,
            FheType::Uint64 => 5,
            FheType::Address => 7,
        }
    }

    /// Inverse of [`FheType::type_byte`]
    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(FheType::Bool),
            2 => Some(FheType::Uint8),
            3 => Some(FheType::Uint16),
            4 => Some(FheType::Uint32),
            5 => Some(FheType::Uint64),
            7 => Some(FheType::Address),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FheType::Bool => "bool",
            FheType::Uint8 => "uint8",
            FheType::Uint16 => "uint16",
            FheType::Uint32 => "uint32",
            FheType::Uint64 => "uint64",
            FheType::Address => "address",
        }
    }
}

impl fmt::Display for FheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FheType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bool" => Ok(FheType::Bool),
            "uint8" => Ok(FheType::Uint8),
            "uint16" => Ok(FheType::Uint16),
            "uint32" => Ok(FheType::Uint32),
            "uint64" => Ok(FheType::Uint64),
            "address" => Ok(FheType::Address),
            other => Err(ValidationError::UnsupportedType(other.to_string())),
        }
    }
}

/// Opaque ciphertext produced by an encrypt operation.
///
/// Carries no runtime type tag; callers remember what they encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue(Vec<u8>);

impl EncryptedValue {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `0x`-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        codec::bytes_to_hex(&self.0)
    }
}

impl From<Vec<u8>> for EncryptedValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for EncryptedValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Plaintext returned by a decryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecryptedValue {
    Bool(bool),
    Number(u64),
    Text(String),
}

/// User decryption request, built per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionRequest {
    pub ciphertext: Vec<u8>,
    pub contract_address: Address,
    pub user_address: Address,
}

/// Outcome of a user or public decryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionResult {
    pub value: DecryptedValue,
    pub success: bool,
}

/// Public key and signature derived for one contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMaterial {
    pub public_key: String,
    pub signature: String,
}

/// Errors surfaced by the SDK
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdkError {
    #[error("FHEVM not initialized: {0}")]
    Precondition(String),

    #[error("Failed to initialize FHEVM: {0}")]
    Initialization(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Signature request rejected: {0}")]
    SignatureRejected(String),

    #[error("Encrypted input batch already finalized")]
    BatchFinalized,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Blockchain error: {0}")]
    Chain(String),
}

impl SdkError {
    pub(crate) fn not_ready() -> Self {
        SdkError::Precondition("call initialize() first".to_string())
    }
}

/// Result type for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;
