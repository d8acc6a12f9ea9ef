use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec;
use crate::fhe::EncryptedInputBuilder;
use crate::types::{Address, FheType, SdkError, SdkResult};
use crate::validation::{self, RawValue, ValidatedValue};

/// Handles plus the proof that binds them to (contract, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedInputs {
    /// One handle per added value, in insertion order
    pub handles: Vec<Vec<u8>>,
    /// `0x` hex
    pub input_proof: String,
}

impl EncryptedInputs {
    pub fn handles_hex(&self) -> Vec<String> {
        self.handles.iter().map(|h| codec::bytes_to_hex(h)).collect()
    }
}

/// Accumulates values for one contract call and encrypts them together.
///
/// The batch is single use: once `finalize()` has been called every further
/// operation fails with [`SdkError::BatchFinalized`].
pub struct EncryptedInputBatch {
    contract_address: Address,
    user_address: Address,
    builder: Option<Box<dyn EncryptedInputBuilder>>,
    types: Vec<FheType>,
}

impl std::fmt::Debug for EncryptedInputBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedInputBatch")
            .field("contract_address", &self.contract_address)
            .field("user_address", &self.user_address)
            .field("types", &self.types)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl EncryptedInputBatch {
    pub(crate) fn new(
        contract_address: Address,
        user_address: Address,
        builder: Box<dyn EncryptedInputBuilder>,
    ) -> Self {
        Self {
            contract_address,
            user_address,
            builder: Some(builder),
            types: Vec::new(),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn user_address(&self) -> Address {
        self.user_address
    }

    /// Types added so far, in order
    pub fn types(&self) -> &[FheType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.builder.is_none()
    }

    /// Validate `value` as `ty` and append it.
    ///
    /// A rejected value leaves the batch unchanged.
    pub fn add(&mut self, ty: FheType, value: impl Into<RawValue>) -> SdkResult<&mut Self> {
        let builder = self.builder.as_mut().ok_or(SdkError::BatchFinalized)?;
        let value = validation::validate(ty, &value.into())?;

        match &value {
            ValidatedValue::Bool(v) => builder.add_bool(*v),
            ValidatedValue::Uint8(v) => builder.add_uint8(*v),
            ValidatedValue::Uint16(v) => builder.add_uint16(*v),
            ValidatedValue::Uint32(v) => builder.add_uint32(*v),
            ValidatedValue::Uint64(v) => builder.add_uint64(*v),
            ValidatedValue::Address(v) => builder.add_address(v),
        }
        self.types.push(value.fhe_type());
        Ok(self)
    }

    pub fn add_bool(&mut self, value: bool) -> SdkResult<&mut Self> {
        self.add(FheType::Bool, value)
    }

    pub fn add_uint8(&mut self, value: impl Into<RawValue>) -> SdkResult<&mut Self> {
        self.add(FheType::Uint8, value)
    }

    pub fn add_uint16(&mut self, value: impl Into<RawValue>) -> SdkResult<&mut Self> {
        self.add(FheType::Uint16, value)
    }

    pub fn add_uint32(&mut self, value: impl Into<RawValue>) -> SdkResult<&mut Self> {
        self.add(FheType::Uint32, value)
    }

    pub fn add_uint64(&mut self, value: impl Into<RawValue>) -> SdkResult<&mut Self> {
        self.add(FheType::Uint64, value)
    }

    pub fn add_address(&mut self, value: &str) -> SdkResult<&mut Self> {
        self.add(FheType::Address, value)
    }

    /// Encrypt everything added so far
    pub async fn finalize(&mut self) -> SdkResult<EncryptedInputs> {
        let mut builder = self.builder.take().ok_or(SdkError::BatchFinalized)?;

        let raw = builder
            .encrypt()
            .await
            .map_err(|e| SdkError::Encryption(format!("{:#}", e)))?;

        if raw.handles.len() != self.types.len() {
            return Err(SdkError::Encryption(format!(
                "expected {} handles, library returned {}",
                self.types.len(),
                raw.handles.len()
            )));
        }

        debug!(
            "Finalized input batch of {} values for contract {} (user {})",
            self.types.len(),
            self.contract_address,
            self.user_address
        );

        Ok(EncryptedInputs {
            handles: raw.handles,
            input_proof: codec::bytes_to_hex(&raw.input_proof),
        })
    }
}
