//! Live application seam.
//!
//! [`LiveApp`] is the only way the resolver touches the application under
//! test. The browser-backed implementation wraps page objects; tests use
//! `test_support::ScriptedApp`.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::{RegistrationForm, RegistrationOutcome};

/// Operations the prerequisite resolver needs from the application.
#[allow(async_fn_in_trait)]
pub trait LiveApp {
    /// Open the login page and submit credentials. `Ok(false)` means the
    /// application did not reach a logged-in state.
    async fn attempt_login(&self, email: &str, password: &str) -> Result<bool>;

    /// Open the registration page, fill and submit the form, and report
    /// whether the flow advanced to email verification.
    async fn register(&self, form: &RegistrationForm) -> Result<RegistrationOutcome>;

    /// Enter a one-time code on the verification page and confirm it.
    async fn submit_verification_code(&self, code: &str) -> Result<()>;

    /// Log out through the UI. Fails when no logout control is reachable.
    async fn logout(&self) -> Result<()>;

    /// Clear cookies and local/session storage, then return to the login page.
    async fn clear_session(&self) -> Result<()>;
}

/// Bring the session to an anonymous state: UI logout first, storage clear as fallback.
#[instrument(skip_all)]
pub async fn force_logout<A: LiveApp>(app: &A) -> Result<()> {
    info!("ensuring clean session state");
    match app.logout().await {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "UI logout unavailable, clearing session storage");
            app.clear_session()
                .await
                .context("clear session after failed UI logout")
        }
    }
}
