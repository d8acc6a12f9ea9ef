use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{DecryptionGateway, GatewayRequest, GatewayResponse, PublicDecryptRequest};

/// Gateway reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("Failed to parse gateway URL")?;
        // Url::join drops the last segment without a trailing slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid gateway path: {}", path))
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = self.endpoint(path)?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .with_context(|| format!("Gateway request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gateway returned {}: {}", status, text));
        }

        response
            .json()
            .await
            .context("Failed to parse gateway response")
    }
}

#[async_trait]
impl DecryptionGateway for HttpGateway {
    async fn user_decrypt(&self, request: GatewayRequest) -> Result<GatewayResponse> {
        self.post("decrypt/user", &request).await
    }

    async fn public_decrypt(&self, request: PublicDecryptRequest) -> Result<GatewayResponse> {
        self.post("decrypt/public", &request).await
    }
}
