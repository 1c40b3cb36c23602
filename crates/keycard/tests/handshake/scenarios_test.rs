use keycard::{
    Check, Field, FormChange, KeysWallet, ParseableSession, SignInOutcome, WalletError,
};
use keycard_core::{AUTHORIZATION_SCHEME, SESSION_REQUIRED};
use nostr_sdk::ToBech32;
use reqwest_middleware::reqwest::Url;
use std::sync::Arc;

use crate::helpers::{existing, key, settle, test_keys, MockWalletClient, TestParts};

#[tokio::test(start_paused = true)]
async fn test_authenticate_then_sign_in() {
    let keys = test_keys();
    let npub = keys.public_key().to_bech32().unwrap();

    let mut parts = TestParts::new();
    parts.wallet = Arc::new(KeysWallet::new(keys));
    parts.session_check = Arc::new(ParseableSession);
    parts
        .issuer
        .expect_issue()
        .times(1)
        .returning(|_| Ok(Some(key("K1"))));

    let expected_wallet = npub.clone();
    parts
        .sign_in
        .expect_sign_in()
        .times(1)
        .withf(move |request| {
            !request.did_session.starts_with(AUTHORIZATION_SCHEME)
                && !request.did_session.is_empty()
                && request.apikey == "K1"
                && request.wallet.as_deref() == Some(expected_wallet.as_str())
                && request.redirect
                && request.callback_url == "/"
        })
        .returning(|_| {
            Ok(SignInOutcome {
                url: Url::parse("http://app.example/").unwrap(),
            })
        });

    let (mut controller, alert) = parts.build(None);
    assert_eq!(controller.wallet_account(), Some(npub));
    assert!(!controller.api_key_enabled());

    let token = controller.derive_session().await.unwrap();
    assert_eq!(
        controller.form().session_display(),
        format!("{}{}", AUTHORIZATION_SCHEME, token.as_str())
    );
    assert!(controller.form().session().is_touched());
    assert_eq!(controller.lookups_issued(), 1);

    let changes = settle(&mut controller).await;

    assert!(changes.contains(&FormChange::ApiKeyFilled));
    assert_eq!(controller.form().api_key().value(), Some(&key("K1")));
    assert_eq!(controller.form().session().check(), Check::Passed);
    assert!(controller.submit_visible());

    let outcome = controller.submit().await.unwrap();
    assert_eq!(outcome.url.path(), "/");
    assert!(alert.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_returning_user_skips_lookup() {
    let mut parts = TestParts::new();
    parts.issuer.expect_issue().never();

    let (mut controller, _alert) = parts.build(existing("abc", "K2"));
    assert_eq!(controller.lookups_issued(), 0);
    assert_eq!(controller.form().session_display(), "Bearer abc");
    assert_eq!(controller.form().api_key().value(), Some(&key("K2")));

    settle(&mut controller).await;

    assert!(controller.submit_visible());
    assert_eq!(controller.lookups_issued(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_signature_leaves_form_empty() {
    let mut wallet = MockWalletClient::new();
    wallet
        .expect_account()
        .returning(|| Some(String::from("npub1someone")));
    wallet
        .expect_sign_message()
        .times(1)
        .returning(|_| Err(WalletError::Rejected(String::from("user denied"))));

    let mut parts = TestParts::new();
    parts.wallet = Arc::new(wallet);
    parts.issuer.expect_issue().never();

    let (mut controller, alert) = parts.build(None);
    assert!(controller.derive_session().await.is_err());

    let messages = alert.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("user denied"));

    assert!(controller.form().session().value().is_none());
    assert!(!controller.api_key_enabled());
    assert_eq!(controller.lookups_issued(), 0);
    assert!(settle(&mut controller).await.is_empty());
    assert_eq!(controller.field_error(Field::Session), None);
    controller.blur(Field::Session);
    assert_eq!(controller.field_error(Field::Session), Some(SESSION_REQUIRED));
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_wallet_is_alerted() {
    let parts = TestParts::new();
    let (mut controller, alert) = parts.build(None);

    assert!(matches!(
        controller.derive_session().await,
        Err(keycard::Error::WalletDisconnected)
    ));
    assert_eq!(alert.messages().len(), 1);
    assert!(controller.form().session().value().is_none());
}
