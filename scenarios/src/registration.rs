//! Registration flows: on-demand user prerequisites and the resend-code chain.

use anyhow::{Context, Result, bail};
use tracing::info;

use suite::core::datagen::RunSlot;
use suite::core::extract::DeliveryFilter;
use suite::core::types::{PrerequisiteClaim, RegistrationOutcome};
use suite::gate::{CountdownGate, RateLimitedControl};
use suite::io::app::LiveApp;
use suite::io::config::SuiteConfig;
use suite::io::inbox::Inbox;
use suite::io::runtime_store::RuntimeStore;
use suite::io::test_data;
use suite::resolver::PrerequisiteResolver;
use suite::retriever::ArtifactRetriever;
use suite::scenario::{ChainReport, ChainRunner};

pub const RESEND_CHAIN: &str = "registration-resend-code";

/// A registered account waiting on the verification page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub email: String,
}

/// Generate a unique identity for this worker and make sure it exists and is verified.
pub async fn ensure_fresh_user<A: LiveApp, I: Inbox>(
    app: &A,
    inbox: &I,
    store: &RuntimeStore,
    config: &SuiteConfig,
    slot: RunSlot,
) -> Result<PrerequisiteClaim> {
    let identity = test_data::email(&config.email_domain, slot);
    info!(identity = %identity, "generated test identity");
    PrerequisiteResolver::new(app, inbox, store, config)
        .ensure(&identity)
        .await
}

/// Register `email` and stop on the verification page.
pub async fn register_pending<A: LiveApp>(
    app: &A,
    config: &SuiteConfig,
    email: &str,
) -> Result<PendingVerification> {
    let form = test_data::registration_form(email, &config.default_password);
    match app.register(&form).await.context("submit registration form")? {
        RegistrationOutcome::Advanced => Ok(PendingVerification {
            email: email.to_string(),
        }),
        RegistrationOutcome::StayedOnForm { error } => bail!(
            "registration for {email} did not reach the verification page: {}",
            error.as_deref().unwrap_or("no form error shown")
        ),
    }
}

/// Resend the code through the countdown gate, then verify with the newest code.
pub async fn resend_and_verify<A, I, C>(
    app: &A,
    inbox: &I,
    resend: &C,
    config: &SuiteConfig,
    pending: &PendingVerification,
) -> Result<()>
where
    A: LiveApp,
    I: Inbox,
    C: RateLimitedControl,
{
    let waited = CountdownGate::new(&config.gate)
        .wait_and_trigger(resend)
        .await?
        .into_result()?;
    info!(waited_ms = waited.as_millis() as u64, "resend code clicked");

    let artifact = ArtifactRetriever::new(inbox, &config.retrieval)
        .retrieve_code(&pending.email, &DeliveryFilter::verification())
        .await?;
    app.submit_verification_code(&artifact.value)
        .await
        .with_context(|| format!("verify {} with resent code", pending.email))
}

/// Two dependent steps: register a fresh user, then resend and use the new code.
///
/// A long resend lockout reports the second step as skipped. The verified
/// identity is recorded in the store for later chains.
pub async fn resend_code_chain<A, I, C>(
    app: &A,
    inbox: &I,
    resend: &C,
    store: &RuntimeStore,
    config: &SuiteConfig,
    slot: RunSlot,
) -> ChainReport
where
    A: LiveApp,
    I: Inbox,
    C: RateLimitedControl,
{
    let mut runner = ChainRunner::new(RESEND_CHAIN, config.scenario_timeout());
    let email = test_data::email(&config.email_domain, slot);

    let pending = runner
        .step(
            "register new user and land on verification",
            register_pending(app, config, &email),
        )
        .await;

    runner
        .step_with(
            "resend code delivers a new valid code",
            pending,
            |pending| async move {
                resend_and_verify(app, inbox, resend, config, &pending).await?;
                store.save_user_email(&pending.email)?;
                store.save_user_verified(true)
            },
        )
        .await;

    runner.finish()
}
