// Mock FHE Library - deterministic stand-in for the external library
//
// Ciphertexts are NOT encrypted. They carry the plaintext next to a digest so
// that MockGateway can "decrypt" them:
//   [0xFE][type byte][plaintext, big-endian][sha256 digest, 32 bytes]
//
// Input handles follow the fhEVM layout:
//   bytes 0..21   hash prefix
//   byte  21      index of the value within its batch
//   bytes 22..30  chain id (big-endian)
//   byte  30      type byte
//   byte  31      handle version

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{EncryptedInputBuilder, FheInstance, FheLibrary, InstanceParams, RawEncryptedInputs};
use crate::codec;
use crate::types::{Address, DecryptedValue, FheType, KeyMaterial};

const CIPHERTEXT_MAGIC: u8 = 0xFE;
const HANDLE_VERSION: u8 = 0;
const DEFAULT_CHAIN_ID: u64 = 31337;

/// Call counters and injected failures shared by a mock library and every
/// instance it creates
#[derive(Debug, Default)]
pub struct MockInstanceState {
    create_calls: AtomicUsize,
    public_key_calls: AtomicUsize,
    encrypt_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    fail_create: Mutex<Option<String>>,
    fail_public_key: Mutex<Option<String>>,
    fail_encrypt: Mutex<Option<String>>,
    last_params: Mutex<Option<InstanceParams>>,
}

impl MockInstanceState {
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn public_key_calls(&self) -> usize {
        self.public_key_calls.load(Ordering::SeqCst)
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Parameters passed to the most recent `create_instance`
    pub fn last_params(&self) -> Option<InstanceParams> {
        self.last_params.lock().clone()
    }
}

/// In-process FHE library with deterministic output
#[derive(Debug, Clone, Default)]
pub struct MockFheLibrary {
    state: Arc<MockInstanceState>,
}

impl MockFheLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Arc<MockInstanceState> {
        self.state.clone()
    }

    /// Make the next `create_instance` calls fail with `message` (None clears)
    pub fn fail_create(&self, message: Option<&str>) {
        *self.state.fail_create.lock() = message.map(str::to_string);
    }

    /// Make public key derivation fail with `message` (None clears)
    pub fn fail_public_key(&self, message: Option<&str>) {
        *self.state.fail_public_key.lock() = message.map(str::to_string);
    }

    /// Make every encrypt entry point fail with `message` (None clears)
    pub fn fail_encrypt(&self, message: Option<&str>) {
        *self.state.fail_encrypt.lock() = message.map(str::to_string);
    }
}

#[async_trait]
impl FheLibrary for MockFheLibrary {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_instance(&self, params: InstanceParams) -> Result<Box<dyn FheInstance>> {
        let generation = self.state.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.last_params.lock() = Some(params.clone());

        if let Some(message) = self.state.fail_create.lock().clone() {
            return Err(anyhow!(message));
        }

        debug!("Mock FHE instance #{} for {}", generation, params.network_url);
        Ok(Box::new(MockInstance {
            state: self.state.clone(),
            chain_id: params.chain_id.unwrap_or(DEFAULT_CHAIN_ID),
            generation: generation as u64,
        }))
    }
}

struct MockInstance {
    state: Arc<MockInstanceState>,
    chain_id: u64,
    generation: u64,
}

impl MockInstance {
    fn encrypt_raw(&self, ty: FheType, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.state.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.state.fail_encrypt.lock().clone() {
            return Err(anyhow!(message));
        }
        Ok(mock_ciphertext(self.generation, ty, plaintext))
    }
}

#[async_trait]
impl FheInstance for MockInstance {
    async fn generate_public_key(&self, contract_address: &Address) -> Result<KeyMaterial> {
        self.state.public_key_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.state.fail_public_key.lock().clone() {
            return Err(anyhow!(message));
        }

        let mut hasher = Sha256::new();
        hasher.update(b"mock-public-key");
        hasher.update(self.generation.to_be_bytes());
        hasher.update(contract_address.as_bytes());
        let public_key = hasher.finalize();

        let mut hasher = Sha256::new();
        hasher.update(b"mock-signature");
        hasher.update(public_key);
        let signature = hasher.finalize();

        Ok(KeyMaterial {
            public_key: codec::bytes_to_hex(&public_key),
            signature: codec::bytes_to_hex(&signature),
        })
    }

    fn encrypt_bool(&self, value: bool) -> Result<Vec<u8>> {
        self.encrypt_raw(FheType::Bool, &[value as u8])
    }

    fn encrypt_uint8(&self, value: u8) -> Result<Vec<u8>> {
        self.encrypt_raw(FheType::Uint8, &value.to_be_bytes())
    }

    fn encrypt_uint16(&self, value: u16) -> Result<Vec<u8>> {
        self.encrypt_raw(FheType::Uint16, &value.to_be_bytes())
    }

    fn encrypt_uint32(&self, value: u32) -> Result<Vec<u8>> {
        self.encrypt_raw(FheType::Uint32, &value.to_be_bytes())
    }

    fn encrypt_uint64(&self, value: u64) -> Result<Vec<u8>> {
        self.encrypt_raw(FheType::Uint64, &value.to_be_bytes())
    }

    fn encrypt_address(&self, value: &Address) -> Result<Vec<u8>> {
        self.encrypt_raw(FheType::Address, value.as_bytes())
    }

    fn create_encrypted_input(
        &self,
        contract_address: &Address,
        user_address: &Address,
    ) -> Result<Box<dyn EncryptedInputBuilder>> {
        self.state.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockInputBuilder {
            contract_address: *contract_address,
            user_address: *user_address,
            chain_id: self.chain_id,
            generation: self.generation,
            values: Vec::new(),
        }))
    }
}

struct MockInputBuilder {
    contract_address: Address,
    user_address: Address,
    chain_id: u64,
    generation: u64,
    values: Vec<(FheType, Vec<u8>)>,
}

#[async_trait]
impl EncryptedInputBuilder for MockInputBuilder {
    fn add_bool(&mut self, value: bool) {
        self.values.push((FheType::Bool, vec![value as u8]));
    }

    fn add_uint8(&mut self, value: u8) {
        self.values.push((FheType::Uint8, value.to_be_bytes().to_vec()));
    }

    fn add_uint16(&mut self, value: u16) {
        self.values.push((FheType::Uint16, value.to_be_bytes().to_vec()));
    }

    fn add_uint32(&mut self, value: u32) {
        self.values.push((FheType::Uint32, value.to_be_bytes().to_vec()));
    }

    fn add_uint64(&mut self, value: u64) {
        self.values.push((FheType::Uint64, value.to_be_bytes().to_vec()));
    }

    fn add_address(&mut self, value: &Address) {
        self.values.push((FheType::Address, value.as_bytes().to_vec()));
    }

    async fn encrypt(&mut self) -> Result<RawEncryptedInputs> {
        if self.values.len() > 255 {
            return Err(anyhow!("too many values in one input batch: {}", self.values.len()));
        }

        let mut handles = Vec::with_capacity(self.values.len());
        for (index, (ty, plaintext)) in self.values.iter().enumerate() {
            let ciphertext = mock_ciphertext(self.generation, *ty, plaintext);
            let mut hasher = Sha256::new();
            hasher.update(&ciphertext);
            hasher.update(self.contract_address.as_bytes());
            hasher.update(self.user_address.as_bytes());
            let digest = hasher.finalize();

            let mut handle = vec![0u8; 32];
            handle[..21].copy_from_slice(&digest[..21]);
            handle[21] = index as u8;
            handle[22..30].copy_from_slice(&self.chain_id.to_be_bytes());
            handle[30] = ty.type_byte();
            handle[31] = HANDLE_VERSION;
            handles.push(handle);
        }

        // [handle count][signer count][handles...]
        let mut input_proof = vec![handles.len() as u8, 0];
        for handle in &handles {
            input_proof.extend_from_slice(handle);
        }

        Ok(RawEncryptedInputs { handles, input_proof })
    }
}

fn mock_ciphertext(generation: u64, ty: FheType, plaintext: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(generation.to_be_bytes());
    hasher.update([ty.type_byte()]);
    hasher.update(plaintext);
    let digest = hasher.finalize();

    let mut out = Vec::with_capacity(2 + plaintext.len() + digest.len());
    out.push(CIPHERTEXT_MAGIC);
    out.push(ty.type_byte());
    out.extend_from_slice(plaintext);
    out.extend_from_slice(&digest);
    out
}

fn plaintext_len(ty: FheType) -> usize {
    match ty {
        FheType::Bool | FheType::Uint8 => 1,
        FheType::Uint16 => 2,
        FheType::Uint32 => 4,
        FheType::Uint64 => 8,
        FheType::Address => 20,
    }
}

/// Recover the plaintext of a mock ciphertext
pub fn decode_mock_ciphertext(ciphertext: &[u8]) -> Option<(FheType, DecryptedValue)> {
    if ciphertext.len() < 2 || ciphertext[0] != CIPHERTEXT_MAGIC {
        return None;
    }
    let ty = FheType::from_type_byte(ciphertext[1])?;
    let len = plaintext_len(ty);
    if ciphertext.len() != 2 + len + 32 {
        return None;
    }
    let plaintext = &ciphertext[2..2 + len];

    let value = match ty {
        FheType::Bool => DecryptedValue::Bool(plaintext[0] != 0),
        FheType::Address => DecryptedValue::Text(codec::bytes_to_hex(plaintext)),
        _ => {
            let mut word = [0u8; 8];
            word[8 - len..].copy_from_slice(plaintext);
            DecryptedValue::Number(u64::from_be_bytes(word))
        }
    };
    Some((ty, value))
}
