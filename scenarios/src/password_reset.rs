//! Forgot-password flow driven by the reset link delivered to the inbox.

use anyhow::{Context, Result};
use tracing::{info, warn};

use suite::core::datagen::RunSlot;
use suite::core::extract::{DeliveryFilter, LinkQuery};
use suite::io::app::LiveApp;
use suite::io::config::SuiteConfig;
use suite::io::inbox::Inbox;
use suite::io::runtime_store::RuntimeStore;
use suite::io::test_data;
use suite::resolver::PrerequisiteResolver;
use suite::retriever::{ArtifactRetriever, FollowedLink};

/// Application pages involved in resetting a password.
#[allow(async_fn_in_trait)]
pub trait PasswordResetApp {
    /// Open "forgot password" from the login page and request a reset for `email`.
    async fn request_reset(&self, email: &str) -> Result<()>;

    /// Fill and confirm the new password on the page the reset link opened.
    async fn set_new_password(&self, password: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetReport {
    pub identity: String,
    pub link: FollowedLink,
}

/// Identity for the reset: the stored user when present, otherwise a fresh one.
pub fn reset_identity(store: &RuntimeStore, config: &SuiteConfig, slot: RunSlot) -> String {
    match store.user_email() {
        Ok(Some(email)) => {
            info!(email = %email, "using stored user");
            email
        }
        Ok(None) => test_data::email(&config.email_domain, slot),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "runtime store unreadable, generating user");
            test_data::email(&config.email_domain, slot)
        }
    }
}

/// Ensure the user exists, request a reset, follow the emailed link and set `new_password`.
pub async fn reset_password<A, I>(
    app: &A,
    inbox: &I,
    store: &RuntimeStore,
    config: &SuiteConfig,
    slot: RunSlot,
    new_password: &str,
) -> Result<PasswordResetReport>
where
    A: LiveApp + PasswordResetApp,
    I: Inbox,
{
    let identity = reset_identity(store, config, slot);
    PrerequisiteResolver::new(app, inbox, store, config)
        .ensure(&identity)
        .await?;

    app.request_reset(&identity)
        .await
        .with_context(|| format!("request password reset for {identity}"))?;

    let link = ArtifactRetriever::new(inbox, &config.retrieval)
        .follow_link(
            &identity,
            &DeliveryFilter::password_reset(),
            &LinkQuery::password_reset(),
        )
        .await?;

    app.set_new_password(new_password)
        .await
        .with_context(|| format!("set new password for {identity}"))?;
    info!(identity = %identity, "password reset completed");

    Ok(PasswordResetReport { identity, link })
}
