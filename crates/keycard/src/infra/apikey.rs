use async_trait::async_trait;
use keycard_core::{validate_api_key, ApiKey, ApiKeyRequest, ApiKeyResponse, SessionToken};
use log::debug;
use reqwest_middleware::{
    reqwest::{StatusCode, Url},
    ClientWithMiddleware,
};
use thiserror::Error;

use crate::debounce::Refinement;

#[derive(Error, Debug)]
pub enum ApiKeyError {
    #[error("problem sending request to key endpoint: {0}")]
    Send(#[from] reqwest_middleware::reqwest::Error),
    #[error("problem sending request to key endpoint: {0}")]
    SendRetry(#[from] reqwest_middleware::Error),
    #[error("problem requesting api key: {0}")]
    Request(String),
}

/// Exchanges an identity session for the API key issued to it
#[async_trait]
pub trait ApiKeyIssuer: Send + Sync {
    /// `Ok(None)` when the endpoint answers without a key
    async fn issue(&self, session: &SessionToken) -> Result<Option<ApiKey>, ApiKeyError>;
}

#[derive(Clone)]
pub struct HttpApiKeyIssuer {
    pub base_url: Url,
    pub client: ClientWithMiddleware,
    path: String,
}

impl HttpApiKeyIssuer {
    pub fn new(client: ClientWithMiddleware, base_url: &Url, path: &str) -> Self {
        Self {
            base_url: base_url.to_owned(),
            client,
            path: path.to_owned(),
        }
    }
}

#[async_trait]
impl ApiKeyIssuer for HttpApiKeyIssuer {
    async fn issue(&self, session: &SessionToken) -> Result<Option<ApiKey>, ApiKeyError> {
        let url = self
            .base_url
            .join(&self.path)
            .map_err(|e| ApiKeyError::Request(e.to_string()))?;

        let response = self
            .client
            .post(url)
            .json(&ApiKeyRequest::from(session))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("no api key issued for this session");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiKeyError::Request(format!(
                "error response from key endpoint with status {}: {:?}",
                status, body
            )));
        }

        let body: ApiKeyResponse = response.json().await?;
        Ok(body.into_key())
    }
}

/// API key refinement: issued keys are UUIDs
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidApiKey;

#[async_trait]
impl Refinement for UuidApiKey {
    async fn check(&self, value: &str) -> bool {
        ApiKey::parse_input(value)
            .map(|key| validate_api_key(&key).is_ok())
            .unwrap_or(false)
    }
}
