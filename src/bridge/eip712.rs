//! EIP-712 typed data for decryption authorization.
//!
//! The payload shape is fixed:
//!
//! ```text
//! domain = { name: "FHEVM Decryption", version: "1", chainId, verifyingContract }
//! Decryption = [ ciphertext: bytes, user: address ]
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};

use crate::codec;
use crate::types::Address;

pub const DECRYPTION_DOMAIN_NAME: &str = "FHEVM Decryption";
pub const DECRYPTION_DOMAIN_VERSION: &str = "1";

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const DECRYPTION_TYPE: &str = "Decryption(bytes ciphertext,address user)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl TypedField {
    fn new(name: &str, ty: &str) -> Self {
        Self { name: name.to_string(), ty: ty.to_string() }
    }
}

/// `Decryption` payload handed to the connected [`TransactionSigner`](super::TransactionSigner)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedData {
    pub domain: Eip712Domain,
    pub primary_type: String,
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub ciphertext: Vec<u8>,
    pub user: Address,
}

impl TypedData {
    /// Build the decryption authorization for one ciphertext
    pub fn decryption(chain_id: u64, verifying_contract: Address, ciphertext: &[u8], user: Address) -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "Decryption".to_string(),
            vec![TypedField::new("ciphertext", "bytes"), TypedField::new("user", "address")],
        );

        Self {
            domain: Eip712Domain {
                name: DECRYPTION_DOMAIN_NAME.to_string(),
                version: DECRYPTION_DOMAIN_VERSION.to_string(),
                chain_id,
                verifying_contract,
            },
            primary_type: "Decryption".to_string(),
            types,
            ciphertext: ciphertext.to_vec(),
            user,
        }
    }

    /// The message value, with bytes hex-encoded
    pub fn message(&self) -> Value {
        json!({
            "ciphertext": codec::bytes_to_hex(&self.ciphertext),
            "user": self.user.to_string(),
        })
    }

    /// Full JSON document, including the implicit `EIP712Domain` type.
    ///
    /// Wallet-backed signers pass this to `eth_signTypedData_v4`.
    pub fn to_json(&self) -> Value {
        let mut types = serde_json::Map::new();
        types.insert(
            "EIP712Domain".to_string(),
            json!([
                {"name": "name", "type": "string"},
                {"name": "version", "type": "string"},
                {"name": "chainId", "type": "uint256"},
                {"name": "verifyingContract", "type": "address"},
            ]),
        );
        for (name, fields) in &self.types {
            types.insert(name.clone(), json!(fields));
        }

        json!({
            "types": types,
            "primaryType": self.primary_type,
            "domain": self.domain,
            "message": self.message(),
        })
    }

    pub fn domain_separator(&self) -> [u8; 32] {
        let mut chain_id = [0u8; 32];
        chain_id[24..].copy_from_slice(&self.domain.chain_id.to_be_bytes());

        let mut hasher = Keccak256::new();
        hasher.update(keccak(DOMAIN_TYPE.as_bytes()));
        hasher.update(keccak(self.domain.name.as_bytes()));
        hasher.update(keccak(self.domain.version.as_bytes()));
        hasher.update(chain_id);
        hasher.update(self.domain.verifying_contract.to_word());
        hasher.finalize().into()
    }

    pub fn struct_hash(&self) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(keccak(DECRYPTION_TYPE.as_bytes()));
        hasher.update(keccak(&self.ciphertext));
        hasher.update(self.user.to_word());
        hasher.finalize().into()
    }

    /// `keccak256(0x1901 || domainSeparator || structHash)`
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update([0x19, 0x01]);
        hasher.update(self.domain_separator());
        hasher.update(self.struct_hash());
        hasher.finalize().into()
    }
}

pub(crate) fn keccak(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> Address {
        "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap()
    }

    fn user() -> Address {
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap()
    }

    #[test]
    fn test_domain_shape() {
        let data = TypedData::decryption(11155111, contract(), &[1, 2, 3], user());
        let json = data.to_json();

        assert_eq!(
            json["domain"],
            json!({
                "name": "FHEVM Decryption",
                "version": "1",
                "chainId": 11155111u64,
                "verifyingContract": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            })
        );
        assert_eq!(
            json["types"]["Decryption"],
            json!([
                {"name": "ciphertext", "type": "bytes"},
                {"name": "user", "type": "address"},
            ])
        );
        assert_eq!(json["primaryType"], "Decryption");
        assert_eq!(json["message"]["ciphertext"], "0x010203");
        assert_eq!(json["message"]["user"], "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
    }

    #[test]
    fn test_signing_hash_binds_every_field() {
        let base = TypedData::decryption(1, contract(), &[1, 2, 3], user());
        let other_chain = TypedData::decryption(2, contract(), &[1, 2, 3], user());
        let other_ct = TypedData::decryption(1, contract(), &[1, 2, 4], user());
        let other_user = TypedData::decryption(1, contract(), &[1, 2, 3], contract());

        assert_eq!(base.signing_hash(), base.clone().signing_hash());
        assert_ne!(base.signing_hash(), other_chain.signing_hash());
        assert_ne!(base.signing_hash(), other_ct.signing_hash());
        assert_ne!(base.signing_hash(), other_user.signing_hash());
        assert_eq!(base.struct_hash(), other_chain.struct_hash());
    }

    #[test]
    fn test_keccak_empty() {
        // keccak256("")
        assert_eq!(
            codec::bytes_to_hex(&keccak(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
