//! Serial scenario chains with explicit step context.
//!
//! Dependent steps pass data through return values instead of shared mutable
//! variables: a step that needs the output of an earlier one takes it as an
//! `Option` input and is skipped when that input is missing.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::time::{Instant, timeout};
use tracing::{info, warn};

use crate::core::types::ScenarioOutcome;
use crate::gate::LockedOutError;

pub const MISSING_CONTEXT_REASON: &str = "shared state from previous step not available";

/// A step that decided at runtime not to run (cached session, opt-out flag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSkipped {
    pub reason: String,
}

impl fmt::Display for StepSkipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped: {}", self.reason)
    }
}

impl Error for StepSkipped {}

/// Error a step body returns to mark itself skipped.
pub fn skip(reason: impl Into<String>) -> anyhow::Error {
    StepSkipped {
        reason: reason.into(),
    }
    .into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub name: String,
    #[serde(flatten)]
    pub outcome: ScenarioOutcome,
    #[serde(rename = "duration_ms", serialize_with = "duration_ms")]
    pub duration: Duration,
}

fn duration_ms<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub chain: String,
    pub steps: Vec<StepRecord>,
}

impl ChainReport {
    /// First failure wins, then first skip; otherwise passed.
    pub fn outcome(&self) -> ScenarioOutcome {
        let failed = self.steps.iter().find(|step| step.outcome.is_failed());
        let skipped = self.steps.iter().find(|step| step.outcome.is_skipped());
        match failed.or(skipped) {
            Some(step) => step.outcome.clone(),
            None => ScenarioOutcome::Passed,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn count(&self, predicate: fn(&ScenarioOutcome) -> bool) -> usize {
        self.steps
            .iter()
            .filter(|step| predicate(&step.outcome))
            .count()
    }
}

/// Map a step error to its outcome. Long lockouts and explicit skips are
/// skips, everything else fails.
pub fn classify(err: &anyhow::Error) -> ScenarioOutcome {
    if let Some(skipped) = err.downcast_ref::<StepSkipped>() {
        return ScenarioOutcome::Skipped {
            reason: skipped.reason.clone(),
        };
    }
    if let Some(locked) = err.downcast_ref::<LockedOutError>() {
        return ScenarioOutcome::Skipped {
            reason: locked.to_string(),
        };
    }
    ScenarioOutcome::Failed {
        reason: format!("{err:#}"),
    }
}

/// Runs the steps of one chain in declared order, each bounded by `step_timeout`.
pub struct ChainRunner {
    step_timeout: Duration,
    report: ChainReport,
}

impl ChainRunner {
    pub fn new(chain: impl Into<String>, step_timeout: Duration) -> Self {
        Self {
            step_timeout,
            report: ChainReport {
                chain: chain.into(),
                steps: Vec::new(),
            },
        }
    }

    /// Run a step with no upstream input. Returns its output when it passed.
    pub async fn step<T, Fut>(&mut self, name: &str, body: Fut) -> Option<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let (outcome, value) = match timeout(self.step_timeout, body).await {
            Ok(Ok(value)) => (ScenarioOutcome::Passed, Some(value)),
            Ok(Err(err)) => (classify(&err), None),
            Err(_) => (
                ScenarioOutcome::Failed {
                    reason: format!("step timed out after {:?}", self.step_timeout),
                },
                None,
            ),
        };
        self.push(name, outcome, started.elapsed());
        value
    }

    /// Run a step that needs `input` from an earlier step; skipped when it is missing.
    pub async fn step_with<A, T, F, Fut>(&mut self, name: &str, input: Option<A>, body: F) -> Option<T>
    where
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match input {
            Some(input) => self.step(name, body(input)).await,
            None => {
                let outcome = ScenarioOutcome::Skipped {
                    reason: MISSING_CONTEXT_REASON.to_string(),
                };
                self.push(name, outcome, Duration::ZERO);
                None
            }
        }
    }

    pub fn finish(self) -> ChainReport {
        self.report
    }

    fn push(&mut self, name: &str, outcome: ScenarioOutcome, duration: Duration) {
        let chain = self.report.chain.as_str();
        match &outcome {
            ScenarioOutcome::Passed => info!(chain, step = name, "step passed"),
            ScenarioOutcome::Skipped { reason } => warn!(chain, step = name, reason = %reason, "step skipped"),
            ScenarioOutcome::Failed { reason } => warn!(chain, step = name, reason = %reason, "step failed"),
        }
        self.report.steps.push(StepRecord {
            name: name.to_string(),
            outcome,
            duration,
        });
    }
}
