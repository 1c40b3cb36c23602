use async_trait::async_trait;
use keycard::{
    Alert, ApiKeyError, ApiKeyIssuer, AuthError, Collaborators, HandshakeController,
    HandshakeOptions, IdentityDeriver, KeysWallet, Refinement, SignIn, SignInOutcome,
    SignedChallengeDeriver, Wallet, WalletError,
};
use keycard_core::{ApiKey, ExternalSession, SessionToken, SignInRequest};
use mockall::mock;
use nostr_sdk::Keys;
use std::{
    sync::{Arc, Mutex, Once},
    time::Duration,
};

pub const NSEC: &str = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";

static INIT_LOGGER: Once = Once::new();

pub fn setup_static_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

mock! {
    #[derive(Send, Sync)]
    pub WalletClient { }

    #[async_trait]
    impl Wallet for WalletClient {
        fn account(&self) -> Option<String>;
        async fn sign_message(&self, message: &str) -> Result<String, WalletError>;
    }
}

mock! {
    #[derive(Send, Sync)]
    pub Issuer { }

    #[async_trait]
    impl ApiKeyIssuer for Issuer {
        async fn issue(&self, session: &SessionToken) -> Result<Option<ApiKey>, ApiKeyError>;
    }
}

mock! {
    #[derive(Send, Sync)]
    pub SignInClient { }

    #[async_trait]
    impl SignIn for SignInClient {
        async fn sign_in(&self, request: SignInRequest) -> Result<SignInOutcome, AuthError>;
    }
}

#[derive(Default)]
pub struct RecordingAlert {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlert {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Alert for RecordingAlert {
    fn alert(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_owned());
    }
}

/// Refinement with a fixed outcome
pub struct FixedCheck(pub bool);

#[async_trait]
impl Refinement for FixedCheck {
    async fn check(&self, _value: &str) -> bool {
        self.0
    }
}

pub fn test_keys() -> Keys {
    Keys::parse(NSEC).unwrap()
}

pub fn key(value: &str) -> ApiKey {
    ApiKey::parse_input(value).unwrap()
}

pub fn existing(did_session: &str, apikey: &str) -> Option<ExternalSession> {
    Some(ExternalSession {
        did_session: Some(did_session.to_owned()),
        apikey: Some(apikey.to_owned()),
    })
}

pub struct TestParts {
    pub wallet: Arc<dyn Wallet>,
    pub deriver: Arc<dyn IdentityDeriver>,
    pub issuer: MockIssuer,
    pub sign_in: MockSignInClient,
    pub alert: Arc<RecordingAlert>,
    pub session_check: Arc<dyn Refinement>,
    pub api_key_check: Arc<dyn Refinement>,
}

impl TestParts {
    /// Disconnected wallet, accepting refinements and mocks with no expectations
    pub fn new() -> Self {
        setup_static_logger();
        Self {
            wallet: Arc::new(KeysWallet::Disconnected),
            deriver: Arc::new(SignedChallengeDeriver::new(
                "app.example",
                time::Duration::days(7),
            )),
            issuer: MockIssuer::new(),
            sign_in: MockSignInClient::new(),
            alert: Arc::new(RecordingAlert::default()),
            session_check: Arc::new(FixedCheck(true)),
            api_key_check: Arc::new(FixedCheck(true)),
        }
    }

    pub fn build(self, existing: Option<ExternalSession>) -> (HandshakeController, Arc<RecordingAlert>) {
        let alert = self.alert.clone();
        let collaborators = Collaborators {
            wallet: self.wallet,
            deriver: self.deriver,
            issuer: Arc::new(self.issuer),
            sign_in: Arc::new(self.sign_in),
            alert: self.alert,
            session_check: self.session_check,
            api_key_check: self.api_key_check,
        };
        let controller = HandshakeController::new(collaborators, HandshakeOptions::default(), existing);
        (controller, alert)
    }
}

/// Settle with an upper bound so a lost completion fails the test instead of hanging it
pub async fn settle(controller: &mut HandshakeController) -> Vec<keycard::FormChange> {
    tokio::time::timeout(Duration::from_secs(30), controller.settle())
        .await
        .expect("background work did not settle")
}
