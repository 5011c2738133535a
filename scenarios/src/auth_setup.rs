//! Per-role authentication setup with a saved-session cache.
//!
//! Each role logs in once and its browser storage state is saved under
//! `storage/auth/<role>.json`; role-based scenarios start from that file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use suite::core::types::Role;
use suite::io::env::{Credentials, SuiteEnv};
use suite::io::session_state::{AuthDecision, SessionStatePaths, auth_decision};
use suite::scenario::{ChainReport, ChainRunner, skip};

pub const AUTH_CHAIN: &str = "authentication-setup";

/// Browser context used to log a role in and capture its session.
#[allow(async_fn_in_trait)]
pub trait SessionAuthenticator {
    async fn login(&self, role: Role, credentials: &Credentials) -> Result<()>;

    async fn verify_dashboard(&self) -> Result<()>;

    /// Write the context's cookies and storage to `path`.
    async fn save_storage_state(&self, path: &Path) -> Result<()>;
}

/// Log `role` in and save its session, unless the cache allows skipping.
pub async fn authenticate<S: SessionAuthenticator>(
    auth: &S,
    env: &SuiteEnv,
    paths: &SessionStatePaths,
    role: Role,
) -> Result<()> {
    let state_path = match auth_decision(paths, env, role) {
        AuthDecision::Reuse { state_path, reason } => {
            info!(%role, path = %state_path.display(), reason = %reason, "skipping authentication");
            return Err(skip(reason));
        }
        AuthDecision::Authenticate { state_path } => state_path,
    };

    auth.login(role, env.credentials(role))
        .await
        .with_context(|| format!("log in as {role}"))?;
    auth.verify_dashboard()
        .await
        .with_context(|| format!("dashboard after {role} login"))?;

    fs::create_dir_all(paths.dir())
        .with_context(|| format!("create directory {}", paths.dir().display()))?;
    auth.save_storage_state(&state_path)
        .await
        .with_context(|| format!("save {role} session to {}", state_path.display()))?;
    info!(%role, path = %state_path.display(), "session captured");
    Ok(())
}

/// Authenticate every role. Roles are independent: one failing does not skip the other.
pub async fn authenticate_all<S: SessionAuthenticator>(
    auth: &S,
    env: &SuiteEnv,
    paths: &SessionStatePaths,
    step_timeout: Duration,
) -> ChainReport {
    let mut runner = ChainRunner::new(AUTH_CHAIN, step_timeout);
    for role in Role::ALL {
        runner
            .step(&format!("authenticate {role}"), authenticate(auth, env, paths, role))
            .await;
    }
    runner.finish()
}
