//! Authentication handshake controller
//!
//! Owns the form and is the only place it is mutated. Background work
//! (debounced refinements and api key lookups) runs on spawned tasks that
//! report back over a channel; results are applied when the owner calls
//! [`HandshakeController::next_change`], [`HandshakeController::settle`] or
//! [`HandshakeController::poll_changes`].

use keycard_core::{ApiKey, ExternalSession, SessionToken, SignInRequest};
use log::{debug, error, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    debounce::{Debouncer, Refinement, Verdict},
    errors::Error,
    form::{Check, Field, FieldState, FormState},
    infra::{
        alert::Alert,
        apikey::ApiKeyIssuer,
        auth::{SignIn, SignInOutcome},
        identity::IdentityDeriver,
        wallet::Wallet,
    },
};

pub struct Collaborators {
    pub wallet: Arc<dyn Wallet>,
    pub deriver: Arc<dyn IdentityDeriver>,
    pub issuer: Arc<dyn ApiKeyIssuer>,
    pub sign_in: Arc<dyn SignIn>,
    pub alert: Arc<dyn Alert>,
    pub session_check: Arc<dyn Refinement>,
    pub api_key_check: Arc<dyn Refinement>,
}

#[derive(Debug, Clone)]
pub struct HandshakeOptions {
    pub session_debounce: Duration,
    pub api_key_debounce: Duration,
    /// Where the provider should send the client after signing in
    pub callback_url: String,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            session_debounce: Duration::from_millis(500),
            api_key_debounce: Duration::from_millis(200),
            callback_url: String::from("/"),
        }
    }
}

/// What applying one background result did to the form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormChange {
    Validated { field: Field, passed: bool },
    /// A newer input replaced the value this verdict was for
    Superseded(Field),
    ApiKeyFilled,
    /// Lookup failed, returned no key, or returned the key already held
    LookupIgnored,
}

enum Completion {
    Verdict(Verdict),
    Lookup(Option<ApiKey>),
}

pub struct HandshakeController {
    form: FormState,
    collaborators: Collaborators,
    options: HandshakeOptions,
    session_debouncer: Debouncer,
    api_key_debouncer: Debouncer,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    lookups_issued: u64,
    cancel: CancellationToken,
}

impl HandshakeController {
    /// Must be called inside a tokio runtime. When `existing` holds both a
    /// session and a key the form is seeded from it and both refinements are
    /// scheduled; seeding never triggers a key lookup.
    pub fn new(
        collaborators: Collaborators,
        options: HandshakeOptions,
        existing: Option<ExternalSession>,
    ) -> Self {
        let session_debouncer = Debouncer::new(
            Field::Session,
            options.session_debounce,
            collaborators.session_check.clone(),
        );
        let api_key_debouncer = Debouncer::new(
            Field::ApiKey,
            options.api_key_debounce,
            collaborators.api_key_check.clone(),
        );
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let mut controller = Self {
            form: FormState::default(),
            collaborators,
            options,
            session_debouncer,
            api_key_debouncer,
            completions_tx,
            completions_rx,
            in_flight: 0,
            lookups_issued: 0,
            cancel: CancellationToken::new(),
        };

        if let Some((session, key)) = existing.as_ref().and_then(ExternalSession::credentials) {
            controller.seed(session, key);
        }
        controller
    }

    fn seed(&mut self, session: SessionToken, key: ApiKey) {
        info!("seeding form from existing session");
        self.form.session = FieldState {
            value: Some(session),
            dirty: true,
            touched: true,
            check: Check::Unchecked,
        };
        self.form.api_key = FieldState {
            value: Some(key),
            dirty: true,
            touched: true,
            check: Check::Unchecked,
        };
        self.revalidate(Field::Session);
        self.revalidate(Field::ApiKey);
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn api_key_enabled(&self) -> bool {
        self.form.api_key_enabled()
    }

    pub fn submit_visible(&self) -> bool {
        self.form.is_valid()
    }

    pub fn field_error(&self, field: Field) -> Option<&'static str> {
        self.form.error(field)
    }

    /// Background results not yet applied
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn lookups_issued(&self) -> u64 {
        self.lookups_issued
    }

    pub fn wallet_account(&self) -> Option<String> {
        self.collaborators.wallet.account()
    }

    /// User edit of the session input
    pub fn input_session(&mut self, input: &str) {
        let value = SessionToken::parse_input(input);
        if value == self.form.session.value {
            return;
        }
        self.set_session(value, false);
    }

    /// User edit of the api key input
    pub fn input_api_key(&mut self, input: &str) -> Result<(), Error> {
        if !self.form.api_key_enabled() {
            return Err(Error::ApiKeyFieldDisabled);
        }
        let value = ApiKey::parse_input(input);
        if value == self.form.api_key.value {
            return Ok(());
        }
        self.form.api_key.value = value;
        self.form.api_key.dirty = true;
        self.revalidate(Field::ApiKey);
        Ok(())
    }

    pub fn blur(&mut self, field: Field) {
        match field {
            Field::Session => self.form.session.touched = true,
            Field::ApiKey => self.form.api_key.touched = true,
        }
    }

    /// Ask the wallet to sign a new identity session and put it in the form.
    /// Failures are alerted to the user before being returned.
    pub async fn derive_session(&mut self) -> Result<SessionToken, Error> {
        let result = if self.collaborators.wallet.account().is_none() {
            Err(Error::WalletDisconnected)
        } else {
            self.collaborators
                .deriver
                .derive(self.collaborators.wallet.as_ref())
                .await
                .map_err(Error::from)
        };

        match result {
            Ok(token) => {
                info!("derived DID session");
                self.set_session(Some(token.clone()), true);
                Ok(token)
            }
            Err(e) => {
                warn!("DID session not derived: {}", e);
                self.collaborators.alert.alert(&e.to_string());
                Err(e)
            }
        }
    }

    /// Hand the credentials to the sign-in provider. Only allowed while the
    /// form is valid; aborted with [`Error::Cancelled`] on shutdown.
    pub async fn submit(&self) -> Result<SignInOutcome, Error> {
        if !self.form.is_valid() {
            return Err(Error::FormInvalid);
        }
        let (Some(session), Some(key)) = (&self.form.session.value, &self.form.api_key.value)
        else {
            return Err(Error::FormInvalid);
        };

        let request = SignInRequest {
            did_session: session.as_str().to_owned(),
            apikey: key.as_str().to_owned(),
            wallet: self.collaborators.wallet.account(),
            redirect: true,
            callback_url: self.options.callback_url.clone(),
        };
        debug!("submitting sign in for wallet {:?}", request.wallet);

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            outcome = self.collaborators.sign_in.sign_in(request) => Ok(outcome?),
        }
    }

    /// Wait for the next background result and apply it. `None` once nothing
    /// is outstanding.
    pub async fn next_change(&mut self) -> Option<FormChange> {
        if self.in_flight == 0 || self.cancel.is_cancelled() {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Apply results until every scheduled check and lookup has reported,
    /// including work scheduled by the results themselves.
    pub async fn settle(&mut self) -> Vec<FormChange> {
        let mut changes = Vec::new();
        while let Some(change) = self.next_change().await {
            changes.push(change);
        }
        changes
    }

    /// Apply whatever has already arrived without waiting.
    pub fn poll_changes(&mut self) -> Vec<FormChange> {
        let mut changes = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            changes.push(self.apply(completion));
        }
        changes
    }

    /// Stop outstanding checks and lookups and abort a pending submit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_session(&mut self, value: Option<SessionToken>, touch: bool) {
        self.form.session.value = value;
        self.form.session.dirty = true;
        if touch {
            self.form.session.touched = true;
        }
        self.revalidate(Field::Session);

        if self.form.session.dirty {
            if let Some(token) = self.form.session.value.clone() {
                self.spawn_lookup(token);
            }
        }
    }

    fn revalidate(&mut self, field: Field) {
        let (debouncer, value) = match field {
            Field::Session => (
                &self.session_debouncer,
                self.form.session.value.as_ref().map(|v| v.as_str().to_owned()),
            ),
            Field::ApiKey => (
                &self.api_key_debouncer,
                self.form.api_key.value.as_ref().map(|v| v.as_str().to_owned()),
            ),
        };

        let check = match value {
            Some(value) => {
                let tx = self.completions_tx.clone();
                debouncer.schedule(value, self.cancel.clone(), move |verdict| {
                    let _ = tx.send(Completion::Verdict(verdict));
                });
                self.in_flight += 1;
                Check::Pending
            }
            None => {
                debouncer.invalidate();
                Check::Unchecked
            }
        };

        match field {
            Field::Session => self.form.session.check = check,
            Field::ApiKey => self.form.api_key.check = check,
        }
    }

    fn spawn_lookup(&mut self, token: SessionToken) {
        self.lookups_issued += 1;
        self.in_flight += 1;

        let issuer = self.collaborators.issuer.clone();
        let tx = self.completions_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let reporter = LookupReporter(Some(tx));
            let key = tokio::select! {
                _ = cancel.cancelled() => {
                    reporter.disarm();
                    return;
                }
                result = issuer.issue(&token) => match result {
                    Ok(key) => key,
                    Err(e) => {
                        error!("failed to look up api key: {}", e);
                        None
                    }
                },
            };
            reporter.send(key);
        });
    }

    fn apply(&mut self, completion: Completion) -> FormChange {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Verdict(verdict) => self.apply_verdict(verdict),
            Completion::Lookup(key) => self.apply_lookup(key),
        }
    }

    fn apply_verdict(&mut self, verdict: Verdict) -> FormChange {
        let (debouncer, check) = match verdict.field {
            Field::Session => (&self.session_debouncer, &mut self.form.session.check),
            Field::ApiKey => (&self.api_key_debouncer, &mut self.form.api_key.check),
        };

        match verdict.passed {
            Some(passed) if debouncer.is_current(verdict.generation) => {
                *check = if passed { Check::Passed } else { Check::Failed };
                debug!("{} refinement passed: {}", verdict.field, passed);
                FormChange::Validated {
                    field: verdict.field,
                    passed,
                }
            }
            _ => FormChange::Superseded(verdict.field),
        }
    }

    fn apply_lookup(&mut self, key: Option<ApiKey>) -> FormChange {
        match key {
            Some(key) if self.form.api_key.value.as_ref() != Some(&key) => {
                info!("api key filled from lookup");
                self.form.api_key.value = Some(key);
                self.form.api_key.dirty = true;
                self.revalidate(Field::ApiKey);
                FormChange::ApiKeyFilled
            }
            _ => {
                debug!("lookup left api key unchanged");
                FormChange::LookupIgnored
            }
        }
    }
}

/// Reports one lookup. A lookup task that unwinds reports no key, so it still
/// counts as finished.
struct LookupReporter(Option<mpsc::UnboundedSender<Completion>>);

impl LookupReporter {
    fn send(mut self, key: Option<ApiKey>) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(Completion::Lookup(key));
        }
    }

    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for LookupReporter {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            warn!("api key lookup ended without a response");
            let _ = tx.send(Completion::Lookup(None));
        }
    }
}

impl Drop for HandshakeController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
