//! Validation utilities shared between the controller and the refinement checks

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{ApiKey, CoreError, IdentitySession, SessionToken};

pub const SESSION_REQUIRED: &str = "A Serialized DID Session string is required.";
pub const SESSION_NOT_PARSEABLE: &str = "DID Session is not parseable.";
pub const API_KEY_REQUIRED: &str = "An API Key is required.";
pub const API_KEY_NOT_VALID: &str = "API Key is not valid.";

/// Keys are issued as UUIDs
pub fn validate_api_key(key: &ApiKey) -> Result<(), CoreError> {
    Uuid::parse_str(key.as_str())
        .map(|_| ())
        .map_err(|e| CoreError::InvalidApiKey(e.to_string()))
}

/// Structural session check: decodes and has not expired
pub fn validate_session(
    token: &SessionToken,
    now: OffsetDateTime,
) -> Result<IdentitySession, CoreError> {
    let session = IdentitySession::decode(token)?;
    if session.is_expired(now) {
        return Err(CoreError::MalformedSession("session has expired".into()));
    }
    Ok(session)
}
