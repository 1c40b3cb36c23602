//! Shared error types

use thiserror::Error;

/// Core errors shared between the controller and its adapters
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid api key: {0}")]
    InvalidApiKey(String),

    #[error("malformed session: {0}")]
    MalformedSession(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
