pub mod config;
pub mod controller;
pub mod debounce;
pub mod errors;
pub mod form;
pub mod infra;
pub mod startup;

pub use config::*;
pub use controller::{Collaborators, FormChange, HandshakeController, HandshakeOptions};
pub use debounce::{Debouncer, Refinement, Verdict};
pub use errors::Error;
pub use form::{Check, Field, FieldState, FormState};
pub use infra::{
    alert::{Alert, LogAlert},
    apikey::{ApiKeyError, ApiKeyIssuer, HttpApiKeyIssuer, UuidApiKey},
    auth::{AuthError, AuthPaths, CredentialsClient, SessionReader, SignIn, SignInOutcome},
    http::{build_reqwest_clients, HttpClients},
    identity::{IdentityDeriver, IdentityError, ParseableSession, SignedChallengeDeriver},
    wallet::{KeysWallet, Wallet, WalletError},
};
pub use startup::*;
