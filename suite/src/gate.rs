//! Countdown-aware gate for rate-limited actions (e.g. "resend code").
//!
//! The gate samples the live countdown, then either waits out a short cooldown
//! and triggers the action once its control is enabled, or reports a lockout
//! above the ceiling without waiting at all.
//!
//! Phases: `Unknown -> Parsing -> {KnownShort, KnownLong, ZeroOrAbsent} ->
//! Enabled -> Triggered`. `KnownLong` ends the gate as locked out.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::core::countdown::{CountdownReading, GateDecision, decide, parse_countdown};
use crate::io::config::GateConfig;

/// A control whose action is blocked by a server-driven cooldown.
#[allow(async_fn_in_trait)]
pub trait RateLimitedControl {
    /// Text of the countdown indicator, `None` when it is not rendered.
    async fn countdown_text(&self) -> Result<Option<String>>;

    async fn is_enabled(&self) -> Result<bool>;

    /// Visible text of the control, for diagnostics.
    async fn label(&self) -> Result<String>;

    async fn trigger(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Unknown,
    Parsing,
    KnownShort,
    KnownLong,
    ZeroOrAbsent,
    Enabled,
    Triggered,
}

impl GatePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            GatePhase::Unknown => "unknown",
            GatePhase::Parsing => "parsing",
            GatePhase::KnownShort => "known-short",
            GatePhase::KnownLong => "known-long",
            GatePhase::ZeroOrAbsent => "zero-or-absent",
            GatePhase::Enabled => "enabled",
            GatePhase::Triggered => "triggered",
        }
    }
}

/// How a gate run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The action was triggered after `waited` of cooldown and enablement polling.
    Triggered {
        waited: Duration,
        reading: Option<CountdownReading>,
    },
    /// The cooldown exceeded the ceiling; nothing was waited or triggered.
    LockedOut {
        remaining: Duration,
        ceiling: Duration,
        text: String,
    },
}

impl GateOutcome {
    /// Convert a lockout into [`LockedOutError`] so callers can use `?`.
    pub fn into_result(self) -> Result<Duration> {
        match self {
            GateOutcome::Triggered { waited, .. } => Ok(waited),
            GateOutcome::LockedOut {
                remaining,
                ceiling,
                text,
            } => Err(LockedOutError {
                remaining,
                ceiling,
                text,
            }
            .into()),
        }
    }
}

/// Long environmental lockout. Scenario runners report it as skipped, not failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedOutError {
    pub remaining: Duration,
    pub ceiling: Duration,
    pub text: String,
}

impl fmt::Display for LockedOutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "action locked out for {}s (ceiling {}s): {:?}",
            self.remaining.as_secs(),
            self.ceiling.as_secs(),
            self.text
        )
    }
}

impl Error for LockedOutError {}

/// The control never reported enabled within the final budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateTimeoutError {
    pub waited: Duration,
    pub last_label: String,
}

impl fmt::Display for GateTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "control not enabled after {:?}; last observed text: {:?}",
            self.waited, self.last_label
        )
    }
}

impl Error for GateTimeoutError {}

pub struct CountdownGate<'a> {
    config: &'a GateConfig,
}

impl<'a> CountdownGate<'a> {
    pub fn new(config: &'a GateConfig) -> Self {
        Self { config }
    }

    #[instrument(skip_all, fields(ceiling_secs = self.config.ceiling_secs))]
    pub async fn wait_and_trigger<C: RateLimitedControl>(&self, control: &C) -> Result<GateOutcome> {
        let started = Instant::now();
        debug!(phase = GatePhase::Unknown.as_str(), "sampling countdown");
        let (reading, text) = self.sample(control).await;

        match decide(reading, self.config.ceiling()) {
            GateDecision::Skip(remaining) => {
                warn!(
                    phase = GatePhase::KnownLong.as_str(),
                    remaining_secs = remaining.as_secs(),
                    "cooldown above ceiling, not waiting"
                );
                return Ok(GateOutcome::LockedOut {
                    remaining,
                    ceiling: self.config.ceiling(),
                    text,
                });
            }
            GateDecision::Wait(remaining) => {
                let wait = remaining + Duration::from_millis(self.config.safety_buffer_ms);
                info!(
                    phase = GatePhase::KnownShort.as_str(),
                    remaining_secs = remaining.as_secs(),
                    wait_ms = wait.as_millis() as u64,
                    "waiting out cooldown"
                );
                sleep(wait).await;
            }
            GateDecision::Immediate => {
                debug!(phase = GatePhase::ZeroOrAbsent.as_str(), "no active cooldown");
            }
        }

        self.wait_enabled(control, started).await?;
        debug!(phase = GatePhase::Enabled.as_str(), "control enabled");

        control
            .trigger()
            .await
            .context("trigger rate-limited action")?;
        let waited = started.elapsed();
        info!(
            phase = GatePhase::Triggered.as_str(),
            waited_ms = waited.as_millis() as u64,
            "action triggered"
        );
        Ok(GateOutcome::Triggered { waited, reading })
    }

    /// Sample up to `poll_attempts` times; the first non-zero reading wins.
    ///
    /// Returns the reading (if any) and the last text observed.
    async fn sample<C: RateLimitedControl>(&self, control: &C) -> (Option<CountdownReading>, String) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut last_text = String::new();
        for attempt in 1..=self.config.poll_attempts {
            match control.countdown_text().await {
                Ok(Some(text)) => {
                    let reading = parse_countdown(&text);
                    debug!(
                        phase = GatePhase::Parsing.as_str(),
                        attempt,
                        text = %text,
                        parsed_secs = reading.map(|r| r.remaining.as_secs()),
                        "countdown sample"
                    );
                    last_text = text;
                    if let Some(reading) = reading.filter(|r| !r.remaining.is_zero()) {
                        return (Some(reading), last_text);
                    }
                }
                Ok(None) => debug!(attempt, "countdown not rendered"),
                Err(err) => debug!(attempt, err = %format!("{err:#}"), "countdown unreadable"),
            }
            if attempt < self.config.poll_attempts {
                sleep(interval).await;
            }
        }
        (None, last_text)
    }

    async fn wait_enabled<C: RateLimitedControl>(&self, control: &C, started: Instant) -> Result<()> {
        let poll = Duration::from_millis(self.config.enable_poll_ms);
        let budget = Duration::from_secs(self.config.enable_timeout_secs);
        let enabled = timeout(budget, async {
            loop {
                match control.is_enabled().await {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(err) => debug!(err = %format!("{err:#}"), "enablement check failed"),
                }
                sleep(poll).await;
            }
        })
        .await;
        if enabled.is_ok() {
            return Ok(());
        }
        let last_label = match control.label().await {
            Ok(label) => label,
            Err(err) => format!("<label unavailable: {err:#}>"),
        };
        Err(GateTimeoutError {
            waited: started.elapsed(),
            last_label,
        }
        .into())
    }
}
