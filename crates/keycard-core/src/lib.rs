//! keycard-core: Shared types for the handshake controller and its HTTP adapters
//!
//! This crate contains the credential types and wire payloads exchanged with the
//! application's auth endpoints.

pub mod errors;
pub mod session;
pub mod types;
pub mod validation;

pub use errors::*;
pub use session::*;
pub use types::*;
pub use validation::*;
