//! Credentials provider client
//!
//! Speaks the next-auth HTTP surface the application exposes: the session
//! endpoint for seeding the form and the CSRF + credentials callback pair for
//! the final sign-in.

use async_trait::async_trait;
use keycard_core::{ExternalSession, SignInRequest};
use log::{debug, info};
use reqwest_middleware::{
    reqwest::{header::ACCEPT, Response, Url},
    ClientWithMiddleware,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::http::HttpClients;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("problem sending request to auth provider: {0}")]
    Send(#[from] reqwest_middleware::reqwest::Error),
    #[error("problem sending request to auth provider: {0}")]
    SendRetry(#[from] reqwest_middleware::Error),
    #[error("problem requesting auth provider: {0}")]
    Request(String),
    #[error("sign in rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    /// Where the provider sends the client next
    pub url: Url,
}

/// Read access to a previously established provider session
#[async_trait]
pub trait SessionReader: Send + Sync {
    async fn read_session(&self) -> Result<Option<ExternalSession>, AuthError>;
}

/// Write access: establishes a new provider session from credentials
#[async_trait]
pub trait SignIn: Send + Sync {
    async fn sign_in(&self, request: SignInRequest) -> Result<SignInOutcome, AuthError>;
}

#[derive(Debug, Clone)]
pub struct AuthPaths {
    pub session: String,
    pub csrf: String,
    pub sign_in: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            session: String::from("/api/auth/session"),
            csrf: String::from("/api/auth/csrf"),
            sign_in: String::from("/api/auth/callback/credentials"),
        }
    }
}

#[derive(Clone)]
pub struct CredentialsClient {
    pub base_url: Url,
    pub client: ClientWithMiddleware,
    /// The credentials callback is not idempotent and is never retried
    sign_in_client: ClientWithMiddleware,
    paths: AuthPaths,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsrfResponse {
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
struct RedirectResponse {
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsForm<'a> {
    did_session: &'a str,
    apikey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    wallet: Option<&'a str>,
    redirect: bool,
    callback_url: &'a str,
    csrf_token: &'a str,
    json: bool,
}

impl CredentialsClient {
    pub fn new(clients: HttpClients, base_url: &Url, paths: AuthPaths) -> Self {
        Self {
            base_url: base_url.to_owned(),
            client: clients.retrying,
            sign_in_client: clients.single_attempt,
            paths,
        }
    }

    fn url(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::Request(e.to_string()))
    }

    async fn ensure_success(response: Response) -> Result<Response, AuthError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Request(format!(
            "error response from auth provider with status {}: {:?}",
            status, body
        )))
    }

    async fn csrf_token(&self) -> Result<String, AuthError> {
        let response = self
            .client
            .get(self.url(&self.paths.csrf)?)
            .header(ACCEPT, mime::APPLICATION_JSON.to_string())
            .send()
            .await?;
        let body: CsrfResponse = Self::ensure_success(response).await?.json().await?;
        Ok(body.csrf_token)
    }
}

#[async_trait]
impl SessionReader for CredentialsClient {
    async fn read_session(&self) -> Result<Option<ExternalSession>, AuthError> {
        let response = self
            .client
            .get(self.url(&self.paths.session)?)
            .header(ACCEPT, mime::APPLICATION_JSON.to_string())
            .send()
            .await?;
        let text = Self::ensure_success(response).await?.text().await?;

        // an anonymous visitor gets `null`, `{}` or nothing at all
        if text.trim().is_empty() {
            return Ok(None);
        }
        let session: Option<ExternalSession> = serde_json::from_str(&text)
            .map_err(|e| AuthError::Request(format!("unreadable session: {}", e)))?;
        debug!(
            "existing session present: {}",
            session.as_ref().and_then(ExternalSession::credentials).is_some()
        );
        Ok(session)
    }
}

#[async_trait]
impl SignIn for CredentialsClient {
    async fn sign_in(&self, request: SignInRequest) -> Result<SignInOutcome, AuthError> {
        let csrf_token = self.csrf_token().await?;
        let form = CredentialsForm {
            did_session: &request.did_session,
            apikey: &request.apikey,
            wallet: request.wallet.as_deref(),
            redirect: request.redirect,
            callback_url: &request.callback_url,
            csrf_token: &csrf_token,
            json: true,
        };

        let response = self
            .sign_in_client
            .post(self.url(&self.paths.sign_in)?)
            .header(ACCEPT, mime::APPLICATION_JSON.to_string())
            .header("X-Auth-Return-Redirect", "1")
            .form(&form)
            .send()
            .await?;
        let body: RedirectResponse = Self::ensure_success(response).await?.json().await?;

        let url = self
            .base_url
            .join(&body.url)
            .map_err(|e| AuthError::Request(e.to_string()))?;

        // the provider reports failures through the redirect target
        if let Some((_, error)) = url.query_pairs().find(|(name, _)| name == "error") {
            return Err(AuthError::Rejected(error.into_owned()));
        }

        info!("signed in, redirecting to {}", url);
        Ok(SignInOutcome { url })
    }
}
