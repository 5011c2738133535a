//! Scripted collaborator doubles for tests.
//!
//! `ScriptedApp`, `ScriptedInbox` and `ScriptedControl` stand in for the
//! browser-backed implementations of [`LiveApp`], [`Inbox`] and
//! [`RateLimitedControl`]. Timing is driven by `tokio::time`, so tests run
//! with a paused clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::Instant;

use crate::core::extract::LinkCandidate;
use crate::core::types::{RegistrationForm, RegistrationOutcome};
use crate::gate::RateLimitedControl;
use crate::io::app::LiveApp;
use crate::io::inbox::{ContentContainer, Inbox};

/// Code accepted by [`ScriptedApp`] unless overridden.
pub const DEFAULT_CODE: &str = "482913";

/// Install a test subscriber writing through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .try_init();
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("scripted state lock")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Account {
    password: String,
    verified: bool,
}

/// Calls observed by a [`ScriptedApp`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppCalls {
    pub logins: usize,
    pub registrations: usize,
    pub verifications: Vec<String>,
    pub ui_logouts: usize,
    pub session_clears: usize,
}

#[derive(Debug, Default)]
struct AppState {
    accounts: BTreeMap<String, Account>,
    pending: Option<String>,
    calls: AppCalls,
}

/// In-memory application with accounts keyed by email.
///
/// Registration of an unknown email advances to verification; registration of
/// a known email stays on the form. A verified account logs in with its password.
#[derive(Debug)]
pub struct ScriptedApp {
    state: Mutex<AppState>,
    code: String,
    ui_logout_fails: bool,
    login_errors: bool,
}

impl Default for ScriptedApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApp {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AppState::default()),
            code: DEFAULT_CODE.to_string(),
            ui_logout_fails: false,
            login_errors: false,
        }
    }

    /// Pre-existing verified account.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        lock(&self.state).accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                verified: true,
            },
        );
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = code.to_string();
        self
    }

    pub fn with_ui_logout_failing(mut self) -> Self {
        self.ui_logout_fails = true;
        self
    }

    /// Every login attempt errors instead of reporting a result.
    pub fn with_login_errors(mut self) -> Self {
        self.login_errors = true;
        self
    }

    /// Remove an account, as if it was deleted from the application.
    pub fn invalidate(&self, email: &str) {
        lock(&self.state).accounts.remove(email);
    }

    pub fn is_verified(&self, email: &str) -> bool {
        lock(&self.state)
            .accounts
            .get(email)
            .is_some_and(|account| account.verified)
    }

    pub fn calls(&self) -> AppCalls {
        lock(&self.state).calls.clone()
    }
}

impl LiveApp for ScriptedApp {
    async fn attempt_login(&self, email: &str, password: &str) -> Result<bool> {
        let mut state = lock(&self.state);
        state.calls.logins += 1;
        if self.login_errors {
            return Err(anyhow!("login page did not load"));
        }
        Ok(state
            .accounts
            .get(email)
            .is_some_and(|account| account.verified && account.password == password))
    }

    async fn register(&self, form: &RegistrationForm) -> Result<RegistrationOutcome> {
        let mut state = lock(&self.state);
        state.calls.registrations += 1;
        if state.accounts.contains_key(&form.email) {
            return Ok(RegistrationOutcome::StayedOnForm {
                error: Some("Email already registered".to_string()),
            });
        }
        state.accounts.insert(
            form.email.clone(),
            Account {
                password: form.password.clone(),
                verified: false,
            },
        );
        state.pending = Some(form.email.clone());
        Ok(RegistrationOutcome::Advanced)
    }

    async fn submit_verification_code(&self, code: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.verifications.push(code.to_string());
        if code != self.code {
            return Err(anyhow!("verification rejected code {code}"));
        }
        let email = state
            .pending
            .take()
            .ok_or_else(|| anyhow!("no registration awaiting verification"))?;
        if let Some(account) = state.accounts.get_mut(&email) {
            account.verified = true;
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.ui_logouts += 1;
        if self.ui_logout_fails {
            return Err(anyhow!("logout control not visible"));
        }
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        lock(&self.state).calls.session_clears += 1;
        Ok(())
    }
}

/// One message in a [`ScriptedInbox`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedMail {
    row: String,
    bodies: HashMap<ContentContainer, String>,
    links: HashMap<ContentContainer, Vec<LinkCandidate>>,
}

impl ScriptedMail {
    /// `row` is the listing text (sender, subject, age).
    pub fn new(row: &str) -> Self {
        Self {
            row: row.to_string(),
            ..Self::default()
        }
    }

    pub fn body(mut self, container: ContentContainer, text: &str) -> Self {
        self.bodies.insert(container, text.to_string());
        self
    }

    pub fn link(mut self, container: ContentContainer, link: LinkCandidate) -> Self {
        self.links.entry(container).or_default().push(link);
        self
    }
}

#[derive(Debug, Default)]
struct InboxState {
    /// Newest first.
    mails: Vec<ScriptedMail>,
    opened_identity: Option<String>,
    opened_entries: Vec<usize>,
    entry_polls: usize,
    content_reads: usize,
    refreshes: usize,
    followed: Vec<LinkCandidate>,
}

/// In-memory public inbox.
#[derive(Debug, Default)]
pub struct ScriptedInbox {
    state: Mutex<InboxState>,
    empty_polls: usize,
    unrendered_reads: usize,
}

impl ScriptedInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `mail` as the newest message.
    pub fn with_mail(self, mail: ScriptedMail) -> Self {
        self.deliver(mail);
        self
    }

    /// The listing stays empty for the first `polls` calls to `entries`.
    pub fn appearing_after_polls(mut self, polls: usize) -> Self {
        self.empty_polls = polls;
        self
    }

    /// `read_content` returns nothing for the first `reads` calls.
    pub fn rendering_after_reads(mut self, reads: usize) -> Self {
        self.unrendered_reads = reads;
        self
    }

    pub fn deliver(&self, mail: ScriptedMail) {
        lock(&self.state).mails.insert(0, mail);
    }

    pub fn opened_identity(&self) -> Option<String> {
        lock(&self.state).opened_identity.clone()
    }

    pub fn opened_entries(&self) -> Vec<usize> {
        lock(&self.state).opened_entries.clone()
    }

    pub fn entry_polls(&self) -> usize {
        lock(&self.state).entry_polls
    }

    pub fn refreshes(&self) -> usize {
        lock(&self.state).refreshes
    }

    pub fn followed(&self) -> Vec<LinkCandidate> {
        lock(&self.state).followed.clone()
    }

    /// Number of messages still listed. Nothing in the retriever may remove them.
    pub fn len(&self) -> usize {
        lock(&self.state).mails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inbox for ScriptedInbox {
    async fn open(&self, identity: &str) -> Result<()> {
        lock(&self.state).opened_identity = Some(identity.to_string());
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        lock(&self.state).refreshes += 1;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<String>> {
        let mut state = lock(&self.state);
        state.entry_polls += 1;
        if state.entry_polls <= self.empty_polls {
            return Ok(Vec::new());
        }
        Ok(state.mails.iter().map(|mail| mail.row.clone()).collect())
    }

    async fn open_entry(&self, index: usize) -> Result<()> {
        let mut state = lock(&self.state);
        if index >= state.mails.len() {
            return Err(anyhow!("no inbox row at index {index}"));
        }
        state.opened_entries.push(index);
        Ok(())
    }

    async fn read_content(&self, container: ContentContainer) -> Result<Option<String>> {
        let mut state = lock(&self.state);
        state.content_reads += 1;
        if state.content_reads <= self.unrendered_reads {
            return Ok(None);
        }
        let Some(&index) = state.opened_entries.last() else {
            return Ok(None);
        };
        Ok(state.mails[index].bodies.get(&container).cloned())
    }

    async fn links(&self, container: ContentContainer) -> Result<Vec<LinkCandidate>> {
        let state = lock(&self.state);
        let Some(&index) = state.opened_entries.last() else {
            return Ok(Vec::new());
        };
        Ok(state.mails[index]
            .links
            .get(&container)
            .cloned()
            .unwrap_or_default())
    }

    async fn follow(&self, link: &LinkCandidate) -> Result<()> {
        lock(&self.state).followed.push(link.clone());
        Ok(())
    }
}

#[derive(Debug)]
struct ControlState {
    countdown: Vec<Option<String>>,
    countdown_reads: usize,
    triggers: usize,
    triggered_at: Vec<Instant>,
}

/// Rate-limited control with a scripted countdown.
///
/// Countdown samples are served in order and the last one repeats. The
/// control reports enabled once its enable time has passed.
#[derive(Debug)]
pub struct ScriptedControl {
    state: Mutex<ControlState>,
    enabled_at: Option<Instant>,
    label: String,
}

impl Default for ScriptedControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedControl {
    /// No countdown rendered, enabled immediately.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControlState {
                countdown: vec![None],
                countdown_reads: 0,
                triggers: 0,
                triggered_at: Vec::new(),
            }),
            enabled_at: Some(Instant::now()),
            label: "Resend code".to_string(),
        }
    }

    pub fn with_countdown<I, S>(self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let samples: Vec<Option<String>> = samples.into_iter().map(|s| Some(s.into())).collect();
        if !samples.is_empty() {
            lock(&self.state).countdown = samples;
        }
        self
    }

    /// Enabled once `delay` has elapsed from now.
    pub fn enabled_after(mut self, delay: Duration) -> Self {
        self.enabled_at = Some(Instant::now() + delay);
        self
    }

    pub fn never_enabled(mut self) -> Self {
        self.enabled_at = None;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn countdown_reads(&self) -> usize {
        lock(&self.state).countdown_reads
    }

    pub fn triggers(&self) -> usize {
        lock(&self.state).triggers
    }

    pub fn triggered_at(&self) -> Vec<Instant> {
        lock(&self.state).triggered_at.clone()
    }
}

impl RateLimitedControl for ScriptedControl {
    async fn countdown_text(&self) -> Result<Option<String>> {
        let mut state = lock(&self.state);
        let index = state.countdown_reads.min(state.countdown.len() - 1);
        state.countdown_reads += 1;
        Ok(state.countdown[index].clone())
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(self.enabled_at.is_some_and(|at| Instant::now() >= at))
    }

    async fn label(&self) -> Result<String> {
        Ok(self.label.clone())
    }

    async fn trigger(&self) -> Result<()> {
        if !self.is_enabled().await? {
            return Err(anyhow!("control {:?} is disabled", self.label));
        }
        let mut state = lock(&self.state);
        state.triggers += 1;
        state.triggered_at.push(Instant::now());
        Ok(())
    }
}
