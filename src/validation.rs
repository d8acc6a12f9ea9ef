//! Input Validation
//!
//! Checks plaintext values against the range of their target encrypted type
//! before anything is handed to the FHE library. Every function here is pure
//! and returns a reason instead of panicking.

use thiserror::Error;

use crate::types::{Address, FheType};

/// Validation failures, each with a human-readable reason
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{ty} value out of range: {value}")]
    OutOfRange { ty: FheType, value: String },

    #[error("{ty} expects an integer, got {value}")]
    NotAnInteger { ty: FheType, value: String },

    #[error("bool expects a boolean, got {0}")]
    NotABoolean(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),
}

/// Untyped plaintext as supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Integer(i128),
    Float(f64),
    Text(String),
}

impl RawValue {
    fn describe(&self) -> String {
        match self {
            RawValue::Bool(b) => b.to_string(),
            RawValue::Integer(i) => i.to_string(),
            RawValue::Float(f) => f.to_string(),
            RawValue::Text(s) => format!("{:?}", s),
        }
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

macro_rules! raw_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for RawValue {
            fn from(v: $t) -> Self {
                RawValue::Integer(v as i128)
            }
        })*
    };
}

raw_from_int!(u8, u16, u32, u64, i8, i16, i32, i64, i128);

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<Address> for RawValue {
    fn from(v: Address) -> Self {
        RawValue::Text(v.to_string())
    }
}

/// Plaintext narrowed to its target type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatedValue {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Address(Address),
}

impl ValidatedValue {
    pub fn fhe_type(&self) -> FheType {
        match self {
            ValidatedValue::Bool(_) => FheType::Bool,
            ValidatedValue::Uint8(_) => FheType::Uint8,
            ValidatedValue::Uint16(_) => FheType::Uint16,
            ValidatedValue::Uint32(_) => FheType::Uint32,
            ValidatedValue::Uint64(_) => FheType::Uint64,
            ValidatedValue::Address(_) => FheType::Address,
        }
    }
}

/// Validate `value` against the range of `ty`
pub fn validate(ty: FheType, value: &RawValue) -> Result<ValidatedValue, ValidationError> {
    match ty {
        FheType::Bool => match value {
            RawValue::Bool(b) => Ok(ValidatedValue::Bool(*b)),
            other => Err(ValidationError::NotABoolean(other.describe())),
        },
        FheType::Uint8 => parse_unsigned(ty, value, u8::MAX as u128).map(|v| ValidatedValue::Uint8(v as u8)),
        FheType::Uint16 => parse_unsigned(ty, value, u16::MAX as u128).map(|v| ValidatedValue::Uint16(v as u16)),
        FheType::Uint32 => parse_unsigned(ty, value, u32::MAX as u128).map(|v| ValidatedValue::Uint32(v as u32)),
        FheType::Uint64 => parse_unsigned(ty, value, u64::MAX as u128).map(|v| ValidatedValue::Uint64(v as u64)),
        FheType::Address => match value {
            RawValue::Text(s) => parse_address(s).map(ValidatedValue::Address),
            other => Err(ValidationError::InvalidAddress(other.describe())),
        },
    }
}

/// Check a string against `0x` + 40 hex digits (any case)
pub fn is_valid_address(s: &str) -> bool {
    parse_address(s).is_ok()
}

pub(crate) fn parse_address(s: &str) -> Result<Address, ValidationError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| ValidationError::InvalidAddress(format!("missing 0x prefix: {}", s)))?;

    if digits.len() != 40 {
        return Err(ValidationError::InvalidAddress(format!(
            "expected 40 hex digits, got {}: {}",
            digits.len(),
            s
        )));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidAddress(format!("non-hex characters: {}", s)));
    }

    let mut bytes = [0u8; 20];
    hex::decode_to_slice(digits, &mut bytes)
        .map_err(|e| ValidationError::InvalidAddress(e.to_string()))?;
    Ok(Address::from_bytes(bytes))
}

fn parse_unsigned(ty: FheType, value: &RawValue, max: u128) -> Result<u128, ValidationError> {
    let out_of_range = || ValidationError::OutOfRange { ty, value: value.describe() };
    let not_integer = || ValidationError::NotAnInteger { ty, value: value.describe() };

    let parsed: u128 = match value {
        RawValue::Integer(i) => {
            if *i < 0 {
                return Err(out_of_range());
            }
            *i as u128
        }
        RawValue::Float(f) => {
            if !f.is_finite() || f.fract() != 0.0 {
                return Err(not_integer());
            }
            if *f < 0.0 || *f > max as f64 {
                return Err(out_of_range());
            }
            // Floats above 2^53 cannot carry an exact integer
            if *f > 9_007_199_254_740_991.0 {
                return Err(not_integer());
            }
            *f as u128
        }
        RawValue::Text(s) => {
            let trimmed = s.trim();
            let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(not_integer());
            }
            if trimmed.starts_with('-') {
                return Err(out_of_range());
            }
            // Longer than u128 is certainly out of range
            digits.parse::<u128>().map_err(|_| out_of_range())?
        }
        RawValue::Bool(_) => return Err(not_integer()),
    };

    if parsed > max {
        return Err(out_of_range());
    }
    Ok(parsed)
}
