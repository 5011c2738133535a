//! Prerequisite resolution against scripted application and inbox doubles.
//!
//! Covers the cache, live-check, creation and self-heal tiers and what each
//! leaves behind in the runtime store.

use suite::core::types::{ClaimSource, FactKey, FactValue};
use suite::io::config::SuiteConfig;
use suite::io::inbox::ContentContainer;
use suite::io::runtime_store::RuntimeStore;
use suite::resolver::{PrerequisiteError, PrerequisiteResolver, ResolveStage};
use suite::retriever::DeliveryNotFoundError;
use suite::test_support::{DEFAULT_CODE, ScriptedApp, ScriptedInbox, ScriptedMail};

const EMAIL: &str = "em_test@example.com";

fn verification_inbox() -> ScriptedInbox {
    ScriptedInbox::new().with_mail(
        ScriptedMail::new("noreply  Verify your email address  just now")
            .body(ContentContainer::HtmlBody, &format!("Your verification code is {DEFAULT_CODE}")),
    )
}

fn store(temp: &tempfile::TempDir) -> RuntimeStore {
    RuntimeStore::new(temp.path().join("storage").join("runtime.json"))
}

#[tokio::test(start_paused = true)]
async fn fresh_identity_is_created_and_recorded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let config = SuiteConfig::default();
    let app = ScriptedApp::new();
    let inbox = verification_inbox();

    assert_eq!(store.read(FactKey::UserEmail).expect("read"), None);

    let claim = PrerequisiteResolver::new(&app, &inbox, &store, &config)
        .ensure(EMAIL)
        .await
        .expect("ensure");

    assert_eq!(claim.source, ClaimSource::FreshlyCreated);
    assert!(claim.is_satisfied());
    assert!(app.is_verified(EMAIL));
    assert_eq!(app.calls().verifications, vec![DEFAULT_CODE.to_string()]);
    assert_eq!(inbox.opened_identity().as_deref(), Some(EMAIL));

    assert_eq!(
        store.read(FactKey::UserEmail).expect("read"),
        Some(FactValue::Text(EMAIL.to_string()))
    );
    assert_eq!(
        store.read(FactKey::UserVerified).expect("read"),
        Some(FactValue::Flag(true))
    );
    let raw = std::fs::read_to_string(store.path()).expect("read store file");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(
        json,
        serde_json::json!({ "userEmail": EMAIL, "userVerified": true })
    );
}

#[tokio::test(start_paused = true)]
async fn second_ensure_uses_cache_and_live_check_only() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let config = SuiteConfig::default();
    let app = ScriptedApp::new();
    let inbox = verification_inbox();
    let resolver = PrerequisiteResolver::new(&app, &inbox, &store, &config);

    let first = resolver.ensure(EMAIL).await.expect("first ensure");
    let second = resolver.ensure(EMAIL).await.expect("second ensure");

    assert_eq!(first.source, ClaimSource::FreshlyCreated);
    assert_eq!(second.source, ClaimSource::LiveCheck);
    let calls = app.calls();
    assert_eq!(calls.registrations, 1);
    assert_eq!(calls.logins, 1);
    // One logout after verification, one after the live check.
    assert_eq!(calls.ui_logouts, 2);
}

#[tokio::test(start_paused = true)]
async fn stale_cache_falls_through_to_creation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let config = SuiteConfig::default();
    let app = ScriptedApp::new();
    let inbox = verification_inbox();
    let resolver = PrerequisiteResolver::new(&app, &inbox, &store, &config);

    resolver.ensure(EMAIL).await.expect("first ensure");
    app.invalidate(EMAIL);

    let claim = resolver.ensure(EMAIL).await.expect("ensure after invalidation");

    assert_eq!(claim.source, ClaimSource::FreshlyCreated);
    assert_eq!(app.calls().registrations, 2);
    assert!(app.is_verified(EMAIL));
    assert_eq!(store.user_verified().expect("read"), Some(true));
}

#[tokio::test(start_paused = true)]
async fn existing_account_without_cache_self_heals() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let config = SuiteConfig::default();
    let app = ScriptedApp::new().with_account(EMAIL, "SomeOtherPassword1!");
    let inbox = ScriptedInbox::new();

    let claim = PrerequisiteResolver::new(&app, &inbox, &store, &config)
        .ensure(EMAIL)
        .await
        .expect("ensure");

    assert_eq!(claim.source, ClaimSource::ExistingAccount);
    assert!(claim.is_satisfied());
    assert_eq!(app.calls().logins, 0);
    assert_eq!(inbox.opened_identity(), None);
    assert_eq!(store.user_email().expect("read").as_deref(), Some(EMAIL));
    assert_eq!(store.user_verified().expect("read"), Some(true));
}

#[tokio::test(start_paused = true)]
async fn live_check_errors_are_treated_as_stale() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    store.save_user_email(EMAIL).expect("seed email");
    store.save_user_verified(true).expect("seed flag");
    let config = SuiteConfig::default();
    let app = ScriptedApp::new()
        .with_account(EMAIL, &config.default_password)
        .with_login_errors();
    let inbox = ScriptedInbox::new();

    let claim = PrerequisiteResolver::new(&app, &inbox, &store, &config)
        .ensure(EMAIL)
        .await
        .expect("ensure");

    assert_eq!(claim.source, ClaimSource::ExistingAccount);
    let calls = app.calls();
    assert_eq!(calls.logins, 1);
    assert_eq!(calls.registrations, 1);
}

#[tokio::test(start_paused = true)]
async fn cached_claim_for_other_identity_is_a_miss() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    store.save_user_email("em_other@example.com").expect("seed email");
    store.save_user_verified(true).expect("seed flag");
    let config = SuiteConfig::default();
    let app = ScriptedApp::new();
    let inbox = verification_inbox();

    let claim = PrerequisiteResolver::new(&app, &inbox, &store, &config)
        .ensure(EMAIL)
        .await
        .expect("ensure");

    assert_eq!(claim.source, ClaimSource::FreshlyCreated);
    assert_eq!(app.calls().logins, 0);
    assert_eq!(store.user_email().expect("read").as_deref(), Some(EMAIL));
}

#[tokio::test(start_paused = true)]
async fn missing_delivery_fails_with_identity_and_stage() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let config = SuiteConfig::default();
    let app = ScriptedApp::new();
    let inbox = ScriptedInbox::new();

    let err = PrerequisiteResolver::new(&app, &inbox, &store, &config)
        .ensure(EMAIL)
        .await
        .unwrap_err();

    let prerequisite = err
        .downcast_ref::<PrerequisiteError>()
        .expect("prerequisite error");
    assert_eq!(prerequisite.identity, EMAIL);
    assert_eq!(prerequisite.stage, ResolveStage::CodeRetrieval);
    let not_found = prerequisite
        .cause
        .downcast_ref::<DeliveryNotFoundError>()
        .expect("delivery not found");
    assert_eq!(not_found.attempts, config.retrieval.attempts);
    assert!(err.to_string().contains(EMAIL));

    assert_eq!(store.user_email().expect("read"), None);
    assert_eq!(store.user_verified().expect("read"), None);
}

#[tokio::test(start_paused = true)]
async fn rejected_code_fails_at_verification() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let config = SuiteConfig::default();
    let app = ScriptedApp::new().with_code("000001");
    let inbox = verification_inbox();

    let err = PrerequisiteResolver::new(&app, &inbox, &store, &config)
        .ensure(EMAIL)
        .await
        .unwrap_err();

    let prerequisite = err
        .downcast_ref::<PrerequisiteError>()
        .expect("prerequisite error");
    assert_eq!(prerequisite.stage, ResolveStage::Verification);
    assert!(err.to_string().contains(DEFAULT_CODE), "{err:#}");
}
