use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DecryptionGateway, GatewayRequest, GatewayResponse, PublicDecryptRequest};
use crate::codec;
use crate::fhe::mock::decode_mock_ciphertext;

/// Gateway that "decrypts" ciphertexts produced by `MockFheLibrary`
#[derive(Debug, Default)]
pub struct MockGateway {
    user_requests: Mutex<Vec<GatewayRequest>>,
    public_requests: Mutex<Vec<PublicDecryptRequest>>,
    failure: Mutex<Option<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every request fail with `message` (None clears)
    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock() = message.map(str::to_string);
    }

    pub fn user_requests(&self) -> Vec<GatewayRequest> {
        self.user_requests.lock().clone()
    }

    pub fn public_requests(&self) -> Vec<PublicDecryptRequest> {
        self.public_requests.lock().clone()
    }

    fn decrypt(&self, ciphertext: &str) -> Result<GatewayResponse> {
        if let Some(message) = self.failure.lock().clone() {
            return Err(anyhow!(message));
        }
        let bytes = codec::hex_to_bytes(ciphertext)?;
        let (_, value) = decode_mock_ciphertext(&bytes)
            .ok_or_else(|| anyhow!("malformed ciphertext ({} bytes)", bytes.len()))?;
        Ok(GatewayResponse {
            decrypted_value: value,
            signature: "0x".to_string(),
        })
    }
}

#[async_trait]
impl DecryptionGateway for MockGateway {
    async fn user_decrypt(&self, request: GatewayRequest) -> Result<GatewayResponse> {
        self.user_requests.lock().push(request.clone());
        if request.signature.len() <= 2 {
            return Err(anyhow!("missing user signature"));
        }
        self.decrypt(&request.ciphertext)
    }

    async fn public_decrypt(&self, request: PublicDecryptRequest) -> Result<GatewayResponse> {
        self.public_requests.lock().push(request.clone());
        self.decrypt(&request.ciphertext)
    }
}
