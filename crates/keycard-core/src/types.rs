//! Credential types and wire payloads shared with the application's auth endpoints

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport marker prepended to a session token when it is rendered into the form.
pub const AUTHORIZATION_SCHEME: &str = "Bearer ";

/// A serialized identity session, always held without the authorization-scheme prefix.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Parse raw form input. Exactly one leading `AUTHORIZATION_SCHEME` is removed;
    /// input that is empty once stripped yields `None`.
    pub fn parse_input(input: &str) -> Option<Self> {
        let raw = input.strip_prefix(AUTHORIZATION_SCHEME).unwrap_or(input);
        Self::from_raw(raw)
    }

    /// Wrap an already unprefixed token, e.g. one read back from an existing session.
    pub fn from_raw(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token as shown in the form and sent in an `Authorization` header.
    pub fn to_header(&self) -> String {
        format!("{}{}", AUTHORIZATION_SCHEME, self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

/// API key issued for an identity session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Empty input yields `None`.
    pub fn parse_input(input: &str) -> Option<Self> {
        if input.is_empty() {
            None
        } else {
            Some(Self(input.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // keep the first segment so logs can tell keys apart
        let visible = self.0.split('-').next().unwrap_or_default();
        f.debug_tuple("ApiKey")
            .field(&format_args!("{}-…", visible))
            .finish()
    }
}

/// Body of `POST /api/apikey`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest {
    /// Raw session, never prefixed
    pub did_session: String,
}

impl From<&SessionToken> for ApiKeyRequest {
    fn from(value: &SessionToken) -> Self {
        Self {
            did_session: value.as_str().to_owned(),
        }
    }
}

/// Response of `POST /api/apikey`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    #[serde(default)]
    pub apikey: Option<String>,
}

impl ApiKeyResponse {
    /// An absent or empty key is treated the same way.
    pub fn into_key(self) -> Option<ApiKey> {
        self.apikey.as_deref().and_then(ApiKey::parse_input)
    }
}

/// Credentials handed to the sign-in provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub did_session: String,
    pub apikey: String,
    /// Connected wallet account, if any
    pub wallet: Option<String>,
    pub redirect: bool,
    pub callback_url: String,
}

/// Session previously established with the provider, read once before the form is built
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSession {
    #[serde(default)]
    pub did_session: Option<String>,
    #[serde(default)]
    pub apikey: Option<String>,
}

impl ExternalSession {
    /// Both halves are required; a session holding only one of them seeds nothing.
    pub fn credentials(&self) -> Option<(SessionToken, ApiKey)> {
        let session = SessionToken::from_raw(self.did_session.clone()?)?;
        let key = ApiKey::parse_input(self.apikey.as_deref()?)?;
        Some((session, key))
    }
}
