use keycard::{Check, Field, FormChange};
use keycard_core::{API_KEY_NOT_VALID, AUTHORIZATION_SCHEME, SESSION_NOT_PARSEABLE};
use std::sync::Arc;

use crate::helpers::{existing, key, settle, FixedCheck, TestParts};

#[tokio::test(start_paused = true)]
async fn test_seeded_fields_are_dirty_touched_and_valid() {
    for raw in ["abc", "eyJhY2NvdW50IjoibnB1YjEifQ"] {
        let (mut controller, _alert) = TestParts::new().build(existing(raw, "K2"));

        let session = controller.form().session();
        assert!(session.is_dirty() && session.is_touched());
        let api_key = controller.form().api_key();
        assert!(api_key.is_dirty() && api_key.is_touched());

        settle(&mut controller).await;

        assert_eq!(controller.form().session().check(), Check::Passed);
        assert_eq!(controller.form().api_key().check(), Check::Passed);
        assert_eq!(
            controller.form().session_display(),
            format!("{}{}", AUTHORIZATION_SCHEME, raw)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_partial_existing_session_seeds_nothing() {
    let partial = Some(keycard_core::ExternalSession {
        did_session: Some(String::from("abc")),
        apikey: None,
    });
    let (controller, _alert) = TestParts::new().build(partial);

    assert!(controller.form().session().value().is_none());
    assert!(!controller.form().session().is_dirty());
    assert_eq!(controller.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submit_strips_exactly_one_prefix() {
    for (input, expected) in [
        ("abc", "abc"),
        ("Bearer abc", "abc"),
        ("Bearer Bearer abc", "Bearer abc"),
    ] {
        let mut parts = TestParts::new();
        parts.issuer.expect_issue().returning(|_| Ok(None));
        let expected = expected.to_owned();
        parts
            .sign_in
            .expect_sign_in()
            .times(1)
            .withf(move |request| request.did_session == expected)
            .returning(|_| {
                Ok(keycard::SignInOutcome {
                    url: reqwest_middleware::reqwest::Url::parse("http://app.example/").unwrap(),
                })
            });

        let (mut controller, _alert) = parts.build(None);
        controller.input_session(input);
        controller.input_api_key("K1").unwrap();
        settle(&mut controller).await;

        assert!(controller.submit_visible());
        controller.submit().await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_lookup_only_follows_dirty_non_empty_session() {
    let mut parts = TestParts::new();
    parts
        .issuer
        .expect_issue()
        .withf(|session| session.as_str() == "typed")
        .times(1)
        .returning(|_| Ok(Some(key("K9"))));

    // pre-populated on mount: no lookup
    let (mut controller, _alert) = parts.build(existing("abc", "K2"));
    assert_eq!(controller.lookups_issued(), 0);
    settle(&mut controller).await;
    assert_eq!(controller.lookups_issued(), 0);

    // api key edits never look anything up
    controller.input_api_key("K3").unwrap();
    settle(&mut controller).await;
    assert_eq!(controller.lookups_issued(), 0);

    // same value again is not an edit
    controller.input_session("Bearer abc");
    assert_eq!(controller.lookups_issued(), 0);

    // a cleared field is dirty but empty
    controller.input_session("");
    assert_eq!(controller.lookups_issued(), 0);
    assert!(controller.form().session().is_dirty());

    controller.input_session("typed");
    assert_eq!(controller.lookups_issued(), 1);
    let changes = settle(&mut controller).await;

    assert!(changes.contains(&FormChange::ApiKeyFilled));
    assert_eq!(controller.form().api_key().value(), Some(&key("K9")));
}

#[tokio::test(start_paused = true)]
async fn test_redundant_lookup_leaves_form_unchanged() {
    for response in [Some("K1"), None] {
        let mut parts = TestParts::new();
        parts
            .issuer
            .expect_issue()
            .returning(move |_| Ok(response.map(key)));

        let (mut controller, _alert) = parts.build(existing("abc", "K1"));
        settle(&mut controller).await;
        let before = controller.form().clone();

        controller.input_session("abc-2");
        let changes = settle(&mut controller).await;

        assert!(changes.contains(&FormChange::LookupIgnored));
        assert_eq!(controller.form().api_key(), before.api_key());
    }
}

#[tokio::test(start_paused = true)]
async fn test_submit_visible_needs_both_refinements() {
    for (session_passes, api_key_passes) in
        [(true, true), (true, false), (false, true), (false, false)]
    {
        let mut parts = TestParts::new();
        parts.session_check = Arc::new(FixedCheck(session_passes));
        parts.api_key_check = Arc::new(FixedCheck(api_key_passes));

        let (mut controller, _alert) = parts.build(existing("abc", "K1"));
        assert!(controller.form().schema_valid());
        assert!(!controller.submit_visible());

        settle(&mut controller).await;

        assert_eq!(
            controller.submit_visible(),
            session_passes && api_key_passes,
            "session {} api key {}",
            session_passes,
            api_key_passes
        );
        assert_eq!(controller.api_key_enabled(), session_passes);
        assert_eq!(
            controller.field_error(Field::Session),
            (!session_passes).then_some(SESSION_NOT_PARSEABLE)
        );
        assert_eq!(
            controller.field_error(Field::ApiKey),
            (!api_key_passes).then_some(API_KEY_NOT_VALID)
        );
        if !(session_passes && api_key_passes) {
            assert!(matches!(
                controller.submit().await,
                Err(keycard::Error::FormInvalid)
            ));
        }
    }
}
