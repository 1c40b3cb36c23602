use async_trait::async_trait;
use keycard_core::{challenge_message, validate_session, CoreError, IdentitySession, SessionToken};
use log::{debug, warn};
use nostr_sdk::{Event, JsonUtil, Kind, ToBech32};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use super::wallet::{Wallet, WalletError};
use crate::debounce::Refinement;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("{0}")]
    Wallet(#[from] WalletError),
    #[error("failed to build session: {0}")]
    Session(#[from] CoreError),
}

/// Turns a wallet signature into a serialized identity session
#[async_trait]
pub trait IdentityDeriver: Send + Sync {
    async fn derive(&self, wallet: &dyn Wallet) -> Result<SessionToken, IdentityError>;
}

pub struct SignedChallengeDeriver {
    domain: String,
    ttl: Duration,
}

impl SignedChallengeDeriver {
    pub fn new(domain: impl Into<String>, ttl: Duration) -> Self {
        Self {
            domain: domain.into(),
            ttl,
        }
    }
}

#[async_trait]
impl IdentityDeriver for SignedChallengeDeriver {
    async fn derive(&self, wallet: &dyn Wallet) -> Result<SessionToken, IdentityError> {
        let account = wallet.account().ok_or(WalletError::NotConnected)?;
        let issued_at = OffsetDateTime::now_utc()
            .replace_nanosecond(0)
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        let (message, expires_at) =
            challenge_message(&self.domain, &account, issued_at, self.ttl)?;

        debug!("requesting signature from {}", account);
        let signature = wallet.sign_message(&message).await?;

        let session = IdentitySession {
            account,
            message,
            signature,
            issued_at,
            expires_at,
        };
        Ok(session.encode()?)
    }
}

/// Session refinement: the token decodes, has not expired, and carries a valid
/// signature by its account over its challenge.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseableSession;

impl ParseableSession {
    pub fn verify(token: &SessionToken) -> Result<IdentitySession, CoreError> {
        let session = validate_session(token, OffsetDateTime::now_utc())?;

        let event = Event::from_json(&session.signature)
            .map_err(|e| CoreError::MalformedSession(e.to_string()))?;
        event
            .verify()
            .map_err(|e| CoreError::MalformedSession(e.to_string()))?;

        let signer = event
            .pubkey
            .to_bech32()
            .map_err(|e| CoreError::MalformedSession(e.to_string()))?;
        if event.kind != Kind::HttpAuth
            || event.content != session.message
            || signer != session.account
        {
            return Err(CoreError::MalformedSession(
                "signature does not cover this session".into(),
            ));
        }

        Ok(session)
    }
}

#[async_trait]
impl Refinement for ParseableSession {
    async fn check(&self, value: &str) -> bool {
        let Some(token) = SessionToken::parse_input(value) else {
            return false;
        };
        match Self::verify(&token) {
            Ok(_) => true,
            Err(e) => {
                warn!("session rejected: {}", e);
                false
            }
        }
    }
}
