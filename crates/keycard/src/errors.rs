use thiserror::Error;

use crate::infra::{auth::AuthError, identity::IdentityError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("connect a wallet before authenticating")]
    WalletDisconnected,
    #[error("failed to authenticate DID session: {0}")]
    Identity(#[from] IdentityError),
    #[error("the api key can only be entered once a session is present")]
    ApiKeyFieldDisabled,
    #[error("form is not valid")]
    FormInvalid,
    #[error("sign in failed: {0}")]
    SignIn(#[from] AuthError),
    #[error("handshake was shut down")]
    Cancelled,
}
