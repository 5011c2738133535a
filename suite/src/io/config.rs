//! Suite configuration stored in `suite.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::atomic_file::write_atomic;
use crate::io::runtime_store::DEFAULT_STORE_PATH;

/// Default config file name at the suite root.
pub const DEFAULT_CONFIG_PATH: &str = "suite.toml";

/// Suite configuration (TOML).
///
/// Missing fields default to the values the suite has been tuned against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SuiteConfig {
    /// Runtime fact store shared by all workers.
    pub store_path: PathBuf,

    /// Password used for generated accounts and their live re-validation.
    pub default_password: String,

    /// Domain of the public inbox service used for generated addresses.
    pub email_domain: String,

    /// Per-scenario wall-clock budget in seconds. All polling budgets must fit below it.
    pub scenario_timeout_secs: u64,

    pub retrieval: RetrievalConfig,

    pub gate: GateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Total listing budget, divided evenly across `attempts`.
    pub total_timeout_secs: u64,
    pub attempts: u32,
    /// Newest listing rows inspected per attempt.
    pub scan_limit: usize,
    /// Interval between listing polls while waiting for the first row.
    pub entry_poll_ms: u64,
    /// Pause after refreshing the inbox between attempts.
    pub refresh_pause_ms: u64,
    pub extract_attempts: u32,
    /// Linear backoff unit: attempt `n` waits `n * extract_backoff_ms`.
    pub extract_backoff_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            total_timeout_secs: 60,
            attempts: 5,
            scan_limit: 15,
            entry_poll_ms: 500,
            refresh_pause_ms: 2_000,
            extract_attempts: 3,
            extract_backoff_ms: 2_000,
        }
    }
}

impl RetrievalConfig {
    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs) / self.attempts.max(1)
    }

    /// Upper bound on the time a single retrieval can spend sleeping and polling.
    pub fn worst_case(&self) -> Duration {
        let listing = Duration::from_secs(self.total_timeout_secs)
            + Duration::from_millis(self.refresh_pause_ms) * self.attempts;
        let n = u64::from(self.extract_attempts);
        let backoff = Duration::from_millis(self.extract_backoff_ms * n * (n + 1) / 2);
        listing + backoff
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    /// Longest cooldown the gate will wait out; longer lockouts skip the scenario.
    pub ceiling_secs: u64,
    /// Countdown samples taken before trusting a zero/absent reading.
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    /// Extra wait on top of the parsed cooldown.
    pub safety_buffer_ms: u64,
    /// Final budget for the control to report enabled.
    pub enable_timeout_secs: u64,
    pub enable_poll_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            ceiling_secs: 120,
            poll_attempts: 5,
            poll_interval_ms: 500,
            safety_buffer_ms: 1_000,
            enable_timeout_secs: 15,
            enable_poll_ms: 250,
        }
    }
}

impl GateConfig {
    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs)
    }

    pub fn worst_case(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms) * self.poll_attempts
            + self.ceiling()
            + Duration::from_millis(self.safety_buffer_ms)
            + Duration::from_secs(self.enable_timeout_secs)
    }
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            default_password: "Password123!".to_string(),
            email_domain: "mailinator.com".to_string(),
            scenario_timeout_secs: 240,
            retrieval: RetrievalConfig::default(),
            gate: GateConfig::default(),
        }
    }
}

impl SuiteConfig {
    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }

    /// Worst case of a step that passes the gate and then retrieves a code.
    pub fn gated_retrieval_worst_case(&self) -> Duration {
        self.gate.worst_case() + self.retrieval.worst_case()
    }

    /// Worst case of a step that ensures a user and then retrieves a second artifact.
    pub fn double_retrieval_worst_case(&self) -> Duration {
        self.retrieval.worst_case() * 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(anyhow!("store_path must not be empty"));
        }
        if self.default_password.is_empty() {
            return Err(anyhow!("default_password must not be empty"));
        }
        if self.email_domain.trim().is_empty() || self.email_domain.contains('@') {
            return Err(anyhow!("email_domain must be a bare domain"));
        }
        if self.scenario_timeout_secs == 0 {
            return Err(anyhow!("scenario_timeout_secs must be > 0"));
        }
        let r = &self.retrieval;
        if r.total_timeout_secs == 0 || r.attempts == 0 || r.scan_limit == 0 {
            return Err(anyhow!(
                "retrieval.total_timeout_secs, attempts and scan_limit must be > 0"
            ));
        }
        if r.extract_attempts == 0 || r.entry_poll_ms == 0 {
            return Err(anyhow!(
                "retrieval.extract_attempts and entry_poll_ms must be > 0"
            ));
        }
        let g = &self.gate;
        if g.poll_attempts == 0 || g.poll_interval_ms == 0 || g.enable_poll_ms == 0 {
            return Err(anyhow!(
                "gate.poll_attempts, poll_interval_ms and enable_poll_ms must be > 0"
            ));
        }
        if g.enable_timeout_secs == 0 {
            return Err(anyhow!("gate.enable_timeout_secs must be > 0"));
        }
        let budget = self.scenario_timeout();
        if r.worst_case() >= budget {
            return Err(anyhow!(
                "retrieval worst case {:?} must stay below scenario_timeout_secs ({:?})",
                r.worst_case(),
                budget
            ));
        }
        if g.worst_case() >= budget {
            return Err(anyhow!(
                "gate worst case {:?} must stay below scenario_timeout_secs ({:?})",
                g.worst_case(),
                budget
            ));
        }
        let composed = [
            ("gate + retrieval", self.gated_retrieval_worst_case()),
            ("ensure + retrieval", self.double_retrieval_worst_case()),
        ];
        for (step, worst_case) in composed {
            if worst_case >= budget {
                return Err(anyhow!(
                    "{step} worst case {worst_case:?} must stay below scenario_timeout_secs ({budget:?})"
                ));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SuiteConfig::default()`.
pub fn load_config(path: &Path) -> Result<SuiteConfig> {
    if !path.exists() {
        let cfg = SuiteConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SuiteConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk.
pub fn write_config(path: &Path, cfg: &SuiteConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
