//! Prerequisite resolution: "user X exists and is verified".
//!
//! The runtime store is an optimization cache, not a source of truth. A cache
//! hit is always downgraded to a non-destructive live login before it is
//! trusted. A stale or missing claim falls through to registration, and a
//! registration that does not advance counts as an untracked prior creation.

use std::error::Error;
use std::fmt;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::extract::DeliveryFilter;
use crate::core::types::{ClaimSource, PrerequisiteClaim, RegistrationOutcome};
use crate::io::app::{LiveApp, force_logout};
use crate::io::config::SuiteConfig;
use crate::io::inbox::Inbox;
use crate::io::runtime_store::RuntimeStore;
use crate::io::test_data;
use crate::retriever::ArtifactRetriever;

/// Step of the creation flow that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    Registration,
    CodeRetrieval,
    Verification,
    Logout,
    StoreWrite,
}

impl ResolveStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolveStage::Registration => "registration",
            ResolveStage::CodeRetrieval => "code retrieval",
            ResolveStage::Verification => "email verification",
            ResolveStage::Logout => "logout",
            ResolveStage::StoreWrite => "store write",
        }
    }
}

/// Every tier failed for `identity`. `cause` keeps the underlying error chain.
#[derive(Debug)]
pub struct PrerequisiteError {
    pub identity: String,
    pub stage: ResolveStage,
    pub cause: anyhow::Error,
}

impl fmt::Display for PrerequisiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prerequisite for {} failed during {}: {:#}",
            self.identity,
            self.stage.as_str(),
            self.cause
        )
    }
}

impl Error for PrerequisiteError {}

pub struct PrerequisiteResolver<'a, A, I> {
    app: &'a A,
    inbox: &'a I,
    store: &'a RuntimeStore,
    config: &'a SuiteConfig,
}

impl<'a, A: LiveApp, I: Inbox> PrerequisiteResolver<'a, A, I> {
    pub fn new(app: &'a A, inbox: &'a I, store: &'a RuntimeStore, config: &'a SuiteConfig) -> Self {
        Self {
            app,
            inbox,
            store,
            config,
        }
    }

    /// Guarantee that `identity` exists and is verified.
    ///
    /// The returned claim is always satisfied: it comes from a live check, a
    /// fresh creation, or a registration that found the account already there.
    #[instrument(skip(self))]
    pub async fn ensure(&self, identity: &str) -> Result<PrerequisiteClaim> {
        info!("checking prerequisite");

        let mut validated = None;
        if let Some(cached) = self.cached_claim(identity) {
            info!(source = ?cached.source, "cache hit, validating against the live application");
            if self.live_check(identity).await {
                info!("live check passed");
                validated = Some(PrerequisiteClaim {
                    source: ClaimSource::LiveCheck,
                    ..cached
                });
            } else {
                warn!("cached claim is stale, re-registering");
            }
        }

        let claim = match validated {
            Some(claim) => claim,
            None => self.create(identity).await?,
        };

        self.record(&claim)?;
        Ok(claim)
    }

    /// Unvalidated cache claim for `identity`. Store errors count as a miss.
    fn cached_claim(&self, identity: &str) -> Option<PrerequisiteClaim> {
        let record = match self.store.snapshot() {
            Ok(record) => record,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "runtime store unreadable, treating as cache miss");
                return None;
            }
        };
        let hit = record.user_email.as_deref() == Some(identity) && record.user_verified == Some(true);
        hit.then(|| PrerequisiteClaim {
            identity: identity.to_string(),
            verified: true,
            source: ClaimSource::Cache,
        })
    }

    /// Cheapest live proof: log in with the default password, then log out.
    async fn live_check(&self, identity: &str) -> bool {
        match self
            .app
            .attempt_login(identity, &self.config.default_password)
            .await
        {
            Ok(true) => match force_logout(self.app).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(err = %format!("{err:#}"), "could not restore anonymous session after live check");
                    false
                }
            },
            Ok(false) => false,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "live check errored");
                false
            }
        }
    }

    async fn create(&self, identity: &str) -> Result<PrerequisiteClaim> {
        info!("registering on the fly");
        let form = test_data::registration_form(identity, &self.config.default_password);

        let outcome = self
            .app
            .register(&form)
            .await
            .map_err(|err| fail(identity, ResolveStage::Registration, err))?;

        let source = match outcome {
            RegistrationOutcome::StayedOnForm { error } => {
                info!(
                    form_error = error.as_deref().unwrap_or(""),
                    "registration did not advance, account already exists"
                );
                ClaimSource::ExistingAccount
            }
            RegistrationOutcome::Advanced => {
                let retriever = ArtifactRetriever::new(self.inbox, &self.config.retrieval);
                let artifact = retriever
                    .retrieve_code(identity, &DeliveryFilter::verification())
                    .await
                    .map_err(|err| fail(identity, ResolveStage::CodeRetrieval, err))?;
                self.app
                    .submit_verification_code(&artifact.value)
                    .await
                    .map_err(|err| fail(identity, ResolveStage::Verification, err))?;
                force_logout(self.app)
                    .await
                    .map_err(|err| fail(identity, ResolveStage::Logout, err))?;
                info!("user created and session reset");
                ClaimSource::FreshlyCreated
            }
        };

        Ok(PrerequisiteClaim {
            identity: identity.to_string(),
            verified: true,
            source,
        })
    }

    fn record(&self, claim: &PrerequisiteClaim) -> Result<()> {
        self.store
            .save_user_email(&claim.identity)
            .and_then(|()| self.store.save_user_verified(claim.verified))
            .map_err(|err| fail(&claim.identity, ResolveStage::StoreWrite, err))
    }
}

fn fail(identity: &str, stage: ResolveStage, cause: anyhow::Error) -> anyhow::Error {
    PrerequisiteError {
        identity: identity.to_string(),
        stage,
        cause,
    }
    .into()
}
