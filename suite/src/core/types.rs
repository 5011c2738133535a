//! Shared deterministic types for the suite core.
//!
//! These types define the contracts between the store, the resolver, the
//! retriever, the gate and the scenario chains. They carry no I/O.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Fixed set of facts shared between scenarios through the runtime store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactKey {
    GroupName,
    ChatMessage,
    UserEmail,
    UserVerified,
}

/// Kind of value a [`FactKey`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    Text,
    Flag,
}

impl FactKey {
    pub const ALL: [FactKey; 4] = [
        FactKey::GroupName,
        FactKey::ChatMessage,
        FactKey::UserEmail,
        FactKey::UserVerified,
    ];

    /// Field name used in the persisted record.
    pub fn as_str(self) -> &'static str {
        match self {
            FactKey::GroupName => "groupName",
            FactKey::ChatMessage => "chatMessage",
            FactKey::UserEmail => "userEmail",
            FactKey::UserVerified => "userVerified",
        }
    }

    pub fn kind(self) -> FactKind {
        match self {
            FactKey::UserVerified => FactKind::Flag,
            FactKey::GroupName | FactKey::ChatMessage | FactKey::UserEmail => FactKind::Text,
        }
    }

    /// Parse a raw CLI value into the kind this key stores.
    pub fn parse_value(self, raw: &str) -> Result<FactValue> {
        match self.kind() {
            FactKind::Text => Ok(FactValue::Text(raw.to_string())),
            FactKind::Flag => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(FactValue::Flag(true)),
                "false" => Ok(FactValue::Flag(false)),
                other => Err(anyhow!(
                    "{} expects true or false, got {other:?}",
                    self.as_str()
                )),
            },
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        FactKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = FactKey::ALL.iter().map(|key| key.as_str()).collect();
                anyhow!("unknown fact key {s:?} (expected one of {})", known.join(", "))
            })
    }
}

/// A stored fact value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Text(String),
    Flag(bool),
}

impl FactValue {
    pub fn kind(&self) -> FactKind {
        match self {
            FactValue::Text(_) => FactKind::Text,
            FactValue::Flag(_) => FactKind::Flag,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Text(value) => f.write_str(value),
            FactValue::Flag(value) => write!(f, "{value}"),
        }
    }
}

/// How a prerequisite claim came to be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimSource {
    /// Read from the runtime store and not yet validated. Never returned as satisfied.
    Cache,
    /// Cached claim re-validated against the live application.
    LiveCheck,
    /// Created by a full registration + verification flow.
    FreshlyCreated,
    /// Registration did not advance: an untracked prior creation already satisfies it.
    ExistingAccount,
}

/// Assertion that a user identity exists and is ready for use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteClaim {
    pub identity: String,
    pub verified: bool,
    pub source: ClaimSource,
}

impl PrerequisiteClaim {
    /// Whether the claim may be acted upon without further validation.
    pub fn is_satisfied(&self) -> bool {
        self.verified && self.source != ClaimSource::Cache
    }
}

/// Outcome of submitting the registration form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The application moved on to the email verification step.
    Advanced,
    /// The application kept the form on screen, usually because the account exists.
    StayedOnForm { error: Option<String> },
}

/// Fields submitted through the registration form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// User roles with pre-provisioned accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Member,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Member, Role::Leader];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Leader => "leader",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of looking up a group in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupLookup {
    Found { name: String, position: usize },
    NotFound { name: String },
}

/// Final classification of a scenario or chain step.
///
/// `Skipped` is distinct from both pass and fail: it marks environment-induced
/// aborts (long lockouts, missing upstream state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScenarioOutcome {
    Passed,
    Failed { reason: String },
    Skipped { reason: String },
}

impl ScenarioOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ScenarioOutcome::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ScenarioOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScenarioOutcome::Failed { .. })
    }
}
