//! # Hex Codec
//!
//! Conversions between byte buffers and `0x`-prefixed hex strings, as used
//! for ciphertexts, input proofs and signatures on the wire.

use thiserror::Error;

/// Hex decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("odd number of hex digits: {0}")]
    OddLength(usize),

    #[error("invalid hex character '{character}' at position {index}")]
    InvalidCharacter { character: char, index: usize },

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Encode bytes as `0x` + lowercase hex
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex string, with or without `0x` prefix, in any case
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, CodecError> {
    let digits = strip_prefix(s);
    if digits.len() % 2 != 0 {
        return Err(CodecError::OddLength(digits.len()));
    }
    hex::decode(digits).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { c, index } => {
            CodecError::InvalidCharacter { character: c, index }
        }
        hex::FromHexError::OddLength => CodecError::OddLength(digits.len()),
        hex::FromHexError::InvalidStringLength => CodecError::OddLength(digits.len()),
    })
}

/// Canonical form: lowercase, `0x` prefixed, even length
pub fn normalize_hex(s: &str) -> Result<String, CodecError> {
    hex_to_bytes(s).map(|b| bytes_to_hex(&b))
}

/// A ciphertext is usable if the library produced any bytes at all.
/// Its structure is never interpreted here.
pub fn is_valid_encrypted_data(data: &[u8]) -> bool {
    !data.is_empty()
}

pub(crate) fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_bytes() {
        let samples: Vec<Vec<u8>> = vec![
            vec![],
            vec![0x00],
            vec![0xff, 0x00, 0x7f],
            (0u8..=255).collect(),
        ];
        for bytes in samples {
            assert_eq!(hex_to_bytes(&bytes_to_hex(&bytes)).unwrap(), bytes);
        }
    }

    #[test]
    fn test_encoding_is_lowercase_prefixed() {
        assert_eq!(bytes_to_hex(&[0xAB, 0x01]), "0xab01");
        assert_eq!(bytes_to_hex(&[]), "0x");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_hex("0XABcd").unwrap(), "0xabcd");
        assert_eq!(normalize_hex("ABCD").unwrap(), "0xabcd");
        assert_eq!(normalize_hex("0x").unwrap(), "0x");
    }

    #[test]
    fn test_rejects_odd_length() {
        assert_eq!(hex_to_bytes("0xabc"), Err(CodecError::OddLength(3)));
    }

    #[test]
    fn test_rejects_non_hex() {
        match hex_to_bytes("0xzz") {
            Err(CodecError::InvalidCharacter { character, index }) => {
                assert_eq!(character, 'z');
                assert_eq!(index, 0);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_valid_encrypted_data() {
        assert!(is_valid_encrypted_data(&[1]));
        assert!(!is_valid_encrypted_data(&[]));
    }
}
