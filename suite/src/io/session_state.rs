//! Cached per-role browser session state (`storage/auth/<role>.json`).
//!
//! Role-based scenarios start from a saved, logged-in session instead of
//! logging in each time. Outside CI a saved session (or an explicit
//! `SKIP_<ROLE>_AUTH`) lets the authentication setup skip the login.

use std::path::{Path, PathBuf};

use crate::core::types::Role;
use crate::io::env::SuiteEnv;

pub const DEFAULT_AUTH_DIR: &str = "storage/auth";

/// Location of saved session files.
#[derive(Debug, Clone)]
pub struct SessionStatePaths {
    dir: PathBuf,
}

impl SessionStatePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn for_role(&self, role: Role) -> PathBuf {
        self.dir.join(format!("{}.json", role.as_str()))
    }
}

/// Whether the authentication setup must log a role in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticate { state_path: PathBuf },
    Reuse { state_path: PathBuf, reason: String },
}

/// Decide whether to log `role` in or reuse its saved session.
///
/// CI always authenticates so every pipeline run starts from a fresh login.
pub fn auth_decision(paths: &SessionStatePaths, env: &SuiteEnv, role: Role) -> AuthDecision {
    let state_path = paths.for_role(role);
    if env.is_ci {
        return AuthDecision::Authenticate { state_path };
    }
    if env.skip_auth_requested(role) {
        let reason = format!("SKIP_{}_AUTH", role.as_str().to_ascii_uppercase());
        return AuthDecision::Reuse { state_path, reason };
    }
    if state_path.exists() {
        return AuthDecision::Reuse {
            state_path,
            reason: "saved session".to_string(),
        };
    }
    AuthDecision::Authenticate { state_path }
}
