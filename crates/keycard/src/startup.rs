use anyhow::anyhow;
use keycard_core::ExternalSession;
use log::{error, info, warn};
use reqwest_middleware::reqwest::Url;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    select,
};

use crate::{
    config::Settings,
    controller::{Collaborators, FormChange, HandshakeController},
    form::Field,
    infra::{
        alert::LogAlert,
        apikey::{HttpApiKeyIssuer, UuidApiKey},
        auth::{CredentialsClient, SessionReader},
        http::build_reqwest_clients,
        identity::{ParseableSession, SignedChallengeDeriver},
        wallet::{KeysWallet, Wallet},
    },
};

/// Runs the authenticate flow from a terminal against a deployed application.
pub struct Application {
    controller: HandshakeController,
}

impl Application {
    pub async fn build(settings: Settings) -> Result<Self, anyhow::Error> {
        let base_url = Url::parse(&settings.app_settings.base_url)
            .map_err(|e| anyhow!("invalid base_url {}: {}", settings.app_settings.base_url, e))?;
        let clients = build_reqwest_clients()?;

        let wallet = KeysWallet::from_key_file(&settings.identity_settings.key_file)?;
        info!("wallet account: {}", wallet.account().unwrap_or_default());

        let auth_client = Arc::new(CredentialsClient::new(
            clients.clone(),
            &base_url,
            settings.app_settings.auth_paths(),
        ));

        let existing = read_existing_session(auth_client.as_ref()).await;

        let collaborators = Collaborators {
            wallet: Arc::new(wallet),
            deriver: Arc::new(SignedChallengeDeriver::new(
                settings.identity_settings.domain.clone(),
                settings.identity_settings.session_ttl()?,
            )),
            issuer: Arc::new(HttpApiKeyIssuer::new(
                clients.retrying,
                &base_url,
                &settings.app_settings.api_key_path,
            )),
            sign_in: auth_client,
            alert: Arc::new(LogAlert),
            session_check: Arc::new(ParseableSession),
            api_key_check: Arc::new(UuidApiKey),
        };

        Ok(Self {
            controller: HandshakeController::new(
                collaborators,
                settings.handshake_options(),
                existing,
            ),
        })
    }

    pub fn controller(&self) -> &HandshakeController {
        &self.controller
    }

    /// Walk the form to a valid state, then sign in unless `submit` is false.
    pub async fn run(mut self, submit: bool) -> Result<(), anyhow::Error> {
        let cancel = self.controller.cancellation_token();
        select! {
            result = self.drive(submit) => result,
            _ = shutdown_signal() => {
                cancel.cancel();
                Err(anyhow!("interrupted"))
            }
        }
    }

    async fn drive(&mut self, submit: bool) -> Result<(), anyhow::Error> {
        let controller = &mut self.controller;

        if controller.form().session().value().is_none() {
            controller.derive_session().await?;
        } else {
            info!("using DID session from existing sign in");
        }
        report(controller.settle().await);

        if let Some(message) = controller.field_error(Field::Session) {
            return Err(anyhow!(message));
        }

        while !controller.submit_visible() {
            if !controller.api_key_enabled() {
                return Err(anyhow!("api key field is disabled"));
            }
            if let Some(message) = controller.field_error(Field::ApiKey) {
                eprintln!("{}", message);
            }
            let Some(input) = prompt("x-api-key (it is in your welcome email): ").await? else {
                return Err(anyhow!("no api key provided"));
            };
            controller.input_api_key(input.trim())?;
            controller.blur(Field::ApiKey);
            report(controller.settle().await);
        }

        println!("authorization: {}", controller.form().session_display());
        if !submit {
            println!("form is valid, skipping sign in");
            return Ok(());
        }

        let outcome = controller.submit().await?;
        println!("signed in, continue at {}", outcome.url);
        Ok(())
    }
}

fn report(changes: Vec<FormChange>) {
    for change in changes {
        match change {
            FormChange::Validated { field, passed } if !passed => {
                error!("{} failed validation", field)
            }
            FormChange::ApiKeyFilled => info!("api key received for this session"),
            _ => {}
        }
    }
}

async fn prompt(label: &str) -> Result<Option<String>, anyhow::Error> {
    eprint!("{}", label);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received SIGINT signal");
}

/// Read-only snapshot of the provider session, taken once before the form is
/// built. A failed read starts the form empty.
pub async fn read_existing_session(reader: &dyn SessionReader) -> Option<ExternalSession> {
    match reader.read_session().await {
        Ok(session) => session,
        Err(e) => {
            warn!("could not read existing session, starting fresh: {}", e);
            None
        }
    }
}
