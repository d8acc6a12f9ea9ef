// TFHE Backend - local encryption with Zama's tfhe-rs
//
// Keys are generated locally when the instance is created, so this backend
// suits development networks where no KMS publishes a network key. Values are
// packed into a CompactCiphertextList (one list per encrypt call or batch) and
// serialized with bincode.
//
// There is no KMS here: the "signature" returned with the public key is a
// SHA-256 binding of the serialized key to the contract address, and the
// input proof is a digest over the packed list rather than a ZK proof.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use tfhe::integer::U256;
use tfhe::{ClientKey, CompactCiphertextList, CompactPublicKey, ConfigBuilder};

use super::{EncryptedInputBuilder, FheInstance, FheLibrary, InstanceParams, RawEncryptedInputs};
use crate::codec;
use crate::types::{Address, FheType, KeyMaterial};

const ADDRESS_BITS: usize = 160;

/// FHE library backed by tfhe-rs
#[derive(Debug, Clone, Default)]
pub struct TfheLibrary;

impl TfheLibrary {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FheLibrary for TfheLibrary {
    fn name(&self) -> &str {
        "tfhe"
    }

    async fn create_instance(&self, params: InstanceParams) -> Result<Box<dyn FheInstance>> {
        info!("Generating TFHE keys for {}", params.network_url);

        // Key generation is CPU bound and takes seconds
        let public_key = tokio::task::spawn_blocking(|| {
            let config = ConfigBuilder::default().build();
            let client_key = ClientKey::generate(config);
            CompactPublicKey::new(&client_key)
        })
        .await
        .context("TFHE key generation task failed")?;

        let public_key_bytes =
            bincode::serialize(&public_key).context("Failed to serialize TFHE public key")?;

        Ok(Box::new(TfheInstance {
            public_key: Arc::new(public_key),
            public_key_bytes,
            chain_id: params.chain_id.unwrap_or_default(),
        }))
    }
}

struct TfheInstance {
    public_key: Arc<CompactPublicKey>,
    public_key_bytes: Vec<u8>,
    chain_id: u64,
}

/// One logical value queued for packing
#[derive(Debug, Clone, Copy)]
enum Slot {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Address([u8; 20]),
}

impl Slot {
    fn fhe_type(&self) -> FheType {
        match self {
            Slot::Bool(_) => FheType::Bool,
            Slot::Uint8(_) => FheType::Uint8,
            Slot::Uint16(_) => FheType::Uint16,
            Slot::Uint32(_) => FheType::Uint32,
            Slot::Uint64(_) => FheType::Uint64,
            Slot::Address(_) => FheType::Address,
        }
    }
}

/// Big-endian address bytes as a 256-bit word
fn address_word(bytes: &[u8; 20]) -> U256 {
    let mut high = [0u8; 16];
    high[12..].copy_from_slice(&bytes[..4]);
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[4..]);
    U256::from((u128::from_be_bytes(low), u128::from_be_bytes(high)))
}

fn pack(public_key: &CompactPublicKey, slots: &[Slot]) -> Result<Vec<u8>> {
    let mut builder = CompactCiphertextList::builder(public_key);
    for slot in slots {
        match *slot {
            Slot::Bool(v) => {
                builder.push(v);
            }
            Slot::Uint8(v) => {
                builder.push(v);
            }
            Slot::Uint16(v) => {
                builder.push(v);
            }
            Slot::Uint32(v) => {
                builder.push(v);
            }
            Slot::Uint64(v) => {
                builder.push(v);
            }
            // one 160-bit entry, so list position == handle index
            Slot::Address(bytes) => {
                builder
                    .push_with_num_bits(address_word(&bytes), ADDRESS_BITS)
                    .map_err(|e| anyhow!("Failed to pack address: {}", e))?;
            }
        }
    }
    let list = builder.build();
    bincode::serialize(&list).map_err(|e| anyhow!("Failed to serialize ciphertext list: {}", e))
}

#[async_trait]
impl FheInstance for TfheInstance {
    async fn generate_public_key(&self, contract_address: &Address) -> Result<KeyMaterial> {
        let mut hasher = Sha256::new();
        hasher.update(&self.public_key_bytes);
        hasher.update(contract_address.as_bytes());
        let binding = hasher.finalize();

        Ok(KeyMaterial {
            public_key: codec::bytes_to_hex(&self.public_key_bytes),
            signature: codec::bytes_to_hex(&binding),
        })
    }

    fn encrypt_bool(&self, value: bool) -> Result<Vec<u8>> {
        pack(&self.public_key, &[Slot::Bool(value)])
    }

    fn encrypt_uint8(&self, value: u8) -> Result<Vec<u8>> {
        pack(&self.public_key, &[Slot::Uint8(value)])
    }

    fn encrypt_uint16(&self, value: u16) -> Result<Vec<u8>> {
        pack(&self.public_key, &[Slot::Uint16(value)])
    }

    fn encrypt_uint32(&self, value: u32) -> Result<Vec<u8>> {
        pack(&self.public_key, &[Slot::Uint32(value)])
    }

    fn encrypt_uint64(&self, value: u64) -> Result<Vec<u8>> {
        pack(&self.public_key, &[Slot::Uint64(value)])
    }

    fn encrypt_address(&self, value: &Address) -> Result<Vec<u8>> {
        pack(&self.public_key, &[Slot::Address(*value.as_bytes())])
    }

    fn create_encrypted_input(
        &self,
        contract_address: &Address,
        user_address: &Address,
    ) -> Result<Box<dyn EncryptedInputBuilder>> {
        Ok(Box::new(TfheInputBuilder {
            public_key: self.public_key.clone(),
            chain_id: self.chain_id,
            contract_address: *contract_address,
            user_address: *user_address,
            slots: Vec::new(),
        }))
    }
}

struct TfheInputBuilder {
    public_key: Arc<CompactPublicKey>,
    chain_id: u64,
    contract_address: Address,
    user_address: Address,
    slots: Vec<Slot>,
}

#[async_trait]
impl EncryptedInputBuilder for TfheInputBuilder {
    fn add_bool(&mut self, value: bool) {
        self.slots.push(Slot::Bool(value));
    }

    fn add_uint8(&mut self, value: u8) {
        self.slots.push(Slot::Uint8(value));
    }

    fn add_uint16(&mut self, value: u16) {
        self.slots.push(Slot::Uint16(value));
    }

    fn add_uint32(&mut self, value: u32) {
        self.slots.push(Slot::Uint32(value));
    }

    fn add_uint64(&mut self, value: u64) {
        self.slots.push(Slot::Uint64(value));
    }

    fn add_address(&mut self, value: &Address) {
        self.slots.push(Slot::Address(*value.as_bytes()));
    }

    async fn encrypt(&mut self) -> Result<RawEncryptedInputs> {
        if self.slots.len() > u8::MAX as usize {
            return Err(anyhow!("too many values in one input batch: {}", self.slots.len()));
        }
        let public_key = self.public_key.clone();
        let slots = self.slots.clone();
        let packed = tokio::task::spawn_blocking(move || pack(&public_key, &slots))
            .await
            .context("TFHE packing task failed")??;

        let mut list_hasher = Sha256::new();
        list_hasher.update(&packed);
        list_hasher.update(self.contract_address.as_bytes());
        list_hasher.update(self.user_address.as_bytes());
        let list_digest = list_hasher.finalize();

        let handles = self
            .slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let mut handle = vec![0u8; 32];
                handle[..21].copy_from_slice(&list_digest[..21]);
                handle[21] = index as u8;
                handle[22..30].copy_from_slice(&self.chain_id.to_be_bytes());
                handle[30] = slot.fhe_type().type_byte();
                handle
            })
            .collect::<Vec<_>>();

        debug!("Packed {} TFHE inputs into {} bytes", handles.len(), packed.len());

        let mut input_proof = vec![handles.len() as u8, 0];
        for handle in &handles {
            input_proof.extend_from_slice(handle);
        }
        input_proof.extend_from_slice(&packed);

        Ok(RawEncryptedInputs { handles, input_proof })
    }
}
