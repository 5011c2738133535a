//! Environment selection and role credentials.
//!
//! `ENVIRONMENT` picks `staging` or `live`; required variables are read with
//! that prefix (`STAGING_BASE_URL`, `LIVE_LEADER_PASSWORD`, ...). Loading goes
//! through a lookup function so tests never touch the process environment.

use std::fmt;

use anyhow::{Result, anyhow};

use crate::core::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Staging,
    Live,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Live => "live",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Environment::Staging => "STAGING",
            Environment::Live => "LIVE",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username + password of a pre-provisioned role account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolved environment for one suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteEnv {
    pub environment: Environment,
    pub base_url: String,
    pub leader: Credentials,
    pub member: Credentials,
    pub is_ci: bool,
    pub skip_member_auth: bool,
    pub skip_leader_auth: bool,
}

impl SuiteEnv {
    /// Load from the process environment.
    pub fn from_process() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup("ENVIRONMENT")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                anyhow!("ENVIRONMENT variable is missing. Expected \"staging\" or \"live\".")
            })?;
        let environment = match raw.trim().to_ascii_lowercase().as_str() {
            "staging" => Environment::Staging,
            "live" => Environment::Live,
            _ => {
                return Err(anyhow!(
                    "invalid ENVIRONMENT {raw:?}. Expected one of: staging, live"
                ));
            }
        };

        let required = |key: &str| -> Result<String> {
            let full_key = format!("{}_{key}", environment.prefix());
            lookup(&full_key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| anyhow!("missing environment variable: {full_key}"))
        };
        let flag = |key: &str| {
            lookup(key).is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
        };

        Ok(Self {
            environment,
            base_url: required("BASE_URL")?,
            leader: Credentials {
                username: required("LEADER_USERNAME")?,
                password: required("LEADER_PASSWORD")?,
            },
            member: Credentials {
                username: required("MEMBER_USERNAME")?,
                password: required("MEMBER_PASSWORD")?,
            },
            is_ci: flag("CI") || flag("GITHUB_ACTIONS"),
            skip_member_auth: flag("SKIP_MEMBER_AUTH"),
            skip_leader_auth: flag("SKIP_LEADER_AUTH"),
        })
    }

    pub fn credentials(&self, role: Role) -> &Credentials {
        match role {
            Role::Leader => &self.leader,
            Role::Member => &self.member,
        }
    }

    pub fn skip_auth_requested(&self, role: Role) -> bool {
        match role {
            Role::Leader => self.skip_leader_auth,
            Role::Member => self.skip_member_auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn staging() -> HashMap<String, String> {
        vars(&[
            ("ENVIRONMENT", "Staging"),
            ("STAGING_BASE_URL", "https://staging.example.com"),
            ("STAGING_LEADER_USERNAME", "leader@example.com"),
            ("STAGING_LEADER_PASSWORD", "lp"),
            ("STAGING_MEMBER_USERNAME", "member@example.com"),
            ("STAGING_MEMBER_PASSWORD", "mp"),
            ("GITHUB_ACTIONS", "true"),
            ("SKIP_MEMBER_AUTH", "TRUE"),
        ])
    }

    #[test]
    fn loads_prefixed_variables_and_flags() {
        let map = staging();
        let env = SuiteEnv::from_lookup(|k| map.get(k).cloned()).expect("env");
        assert_eq!(env.environment, Environment::Staging);
        assert_eq!(env.base_url, "https://staging.example.com");
        assert_eq!(env.credentials(Role::Leader).password, "lp");
        assert!(env.is_ci);
        assert!(env.skip_auth_requested(Role::Member));
        assert!(!env.skip_auth_requested(Role::Leader));
    }

    #[test]
    fn missing_prefixed_variable_names_full_key() {
        let mut map = staging();
        map.remove("STAGING_MEMBER_PASSWORD");
        let err = SuiteEnv::from_lookup(|k| map.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("STAGING_MEMBER_PASSWORD"));
    }

    #[test]
    fn rejects_unknown_environment() {
        let map = vars(&[("ENVIRONMENT", "prod")]);
        let err = SuiteEnv::from_lookup(|k| map.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("invalid ENVIRONMENT"));
        let empty = HashMap::<String, String>::new();
        assert!(SuiteEnv::from_lookup(|k| empty.get(k).cloned()).is_err());
    }

    #[test]
    fn debug_redacts_passwords() {
        let map = staging();
        let env = SuiteEnv::from_lookup(|k| map.get(k).cloned()).expect("env");
        let printed = format!("{env:?}");
        assert!(!printed.contains("\"lp\""));
        assert!(printed.contains("<redacted>"));
    }
}
