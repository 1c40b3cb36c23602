//! Serialized identity session format
//!
//! A session is the wallet-signed challenge plus the account that signed it,
//! encoded as base64(JSON). Signature checking lives with the signer
//! implementation; this module only knows the envelope.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

use crate::{CoreError, SessionToken};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySession {
    /// Account identifier of the wallet that signed `message`
    pub account: String,
    /// Challenge text presented to the wallet
    pub message: String,
    /// Opaque signature produced by the wallet over `message`
    pub signature: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl IdentitySession {
    pub fn encode(&self) -> Result<SessionToken, CoreError> {
        let json = serde_json::to_string(self)?;
        SessionToken::from_raw(BASE64.encode(json))
            .ok_or_else(|| CoreError::MalformedSession("empty session".into()))
    }

    pub fn decode(token: &SessionToken) -> Result<Self, CoreError> {
        let bytes = BASE64
            .decode(token.as_str())
            .map_err(|e| CoreError::MalformedSession(e.to_string()))?;
        let session: IdentitySession = serde_json::from_slice(&bytes)?;
        if session.account.is_empty() || session.signature.is_empty() {
            return Err(CoreError::MalformedSession(
                "account and signature are required".into(),
            ));
        }
        if session.expires_at <= session.issued_at {
            return Err(CoreError::MalformedSession(
                "session expires before it was issued".into(),
            ));
        }
        Ok(session)
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// Build the challenge a wallet is asked to sign.
pub fn challenge_message(
    domain: &str,
    account: &str,
    issued_at: OffsetDateTime,
    ttl: Duration,
) -> Result<(String, OffsetDateTime), CoreError> {
    let expires_at = issued_at + ttl;
    let issued = issued_at
        .format(&Rfc3339)
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    let expires = expires_at
        .format(&Rfc3339)
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let message = format!(
        "{} wants you to sign in with your account:\n{}\n\nIssued At: {}\nExpiration Time: {}",
        domain, account, issued, expires
    );
    Ok((message, expires_at))
}
