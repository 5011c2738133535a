//! Per-role authentication setup and the saved-session cache.

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, bail};
use scenarios::auth_setup::{AUTH_CHAIN, SessionAuthenticator, authenticate, authenticate_all};
use suite::core::types::{Role, ScenarioOutcome};
use suite::io::env::{Credentials, Environment, SuiteEnv};
use suite::io::session_state::SessionStatePaths;
use suite::scenario::StepSkipped;

const STEP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Default)]
struct FakeAuth {
    logins: Mutex<Vec<String>>,
    dashboard_missing: bool,
}

impl SessionAuthenticator for FakeAuth {
    async fn login(&self, _role: Role, credentials: &Credentials) -> Result<()> {
        self.logins.lock().unwrap().push(credentials.username.clone());
        Ok(())
    }

    async fn verify_dashboard(&self) -> Result<()> {
        if self.dashboard_missing {
            bail!("dashboard heading not visible");
        }
        Ok(())
    }

    async fn save_storage_state(&self, path: &Path) -> Result<()> {
        fs::write(path, r#"{"cookies":[],"origins":[]}"#)?;
        Ok(())
    }
}

fn env(is_ci: bool) -> SuiteEnv {
    SuiteEnv {
        environment: Environment::Staging,
        base_url: "https://staging.example.com".to_string(),
        leader: Credentials {
            username: "leader@example.com".to_string(),
            password: "leader-pw".to_string(),
        },
        member: Credentials {
            username: "member@example.com".to_string(),
            password: "member-pw".to_string(),
        },
        is_ci,
        skip_member_auth: false,
        skip_leader_auth: false,
    }
}

#[tokio::test]
async fn authenticates_every_role_without_saved_sessions() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = SessionStatePaths::new(temp.path().join("storage/auth"));
    let auth = FakeAuth::default();

    let report = authenticate_all(&auth, &env(false), &paths, STEP_TIMEOUT).await;

    assert_eq!(report.chain, AUTH_CHAIN);
    assert_eq!(report.outcome(), ScenarioOutcome::Passed, "{report:?}");
    assert_eq!(
        *auth.logins.lock().unwrap(),
        vec!["member@example.com", "leader@example.com"]
    );
    assert!(paths.for_role(Role::Member).exists());
    assert!(paths.for_role(Role::Leader).exists());
}

#[tokio::test]
async fn saved_session_is_reused_outside_ci() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = SessionStatePaths::new(temp.path());
    fs::write(paths.for_role(Role::Leader), "{}").expect("seed");
    let auth = FakeAuth::default();

    let report = authenticate_all(&auth, &env(false), &paths, STEP_TIMEOUT).await;

    assert!(report.step("authenticate member").expect("step").outcome.is_passed());
    assert_eq!(
        report.step("authenticate leader").expect("step").outcome,
        ScenarioOutcome::Skipped {
            reason: "saved session".to_string()
        }
    );
    assert_eq!(*auth.logins.lock().unwrap(), vec!["member@example.com"]);
    assert_eq!(
        fs::read_to_string(paths.for_role(Role::Leader)).expect("read"),
        "{}"
    );
}

#[tokio::test]
async fn ci_always_logs_in() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = SessionStatePaths::new(temp.path());
    fs::write(paths.for_role(Role::Leader), "{}").expect("seed");
    fs::write(paths.for_role(Role::Member), "{}").expect("seed");
    let auth = FakeAuth::default();

    let report = authenticate_all(&auth, &env(true), &paths, STEP_TIMEOUT).await;

    assert!(report.outcome().is_passed(), "{report:?}");
    assert_eq!(auth.logins.lock().unwrap().len(), 2);
    assert_ne!(
        fs::read_to_string(paths.for_role(Role::Leader)).expect("read"),
        "{}"
    );
}

#[tokio::test]
async fn skip_flag_reports_its_variable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = SessionStatePaths::new(temp.path());
    let mut env = env(false);
    env.skip_member_auth = true;
    let auth = FakeAuth::default();

    let err = authenticate(&auth, &env, &paths, Role::Member)
        .await
        .unwrap_err();

    let skipped = err.downcast_ref::<StepSkipped>().expect("skip");
    assert_eq!(skipped.reason, "SKIP_MEMBER_AUTH");
    assert!(auth.logins.lock().unwrap().is_empty());
    assert!(!paths.for_role(Role::Member).exists());
}

#[tokio::test]
async fn missing_dashboard_fails_without_saving() {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = SessionStatePaths::new(temp.path().join("auth"));
    let auth = FakeAuth {
        dashboard_missing: true,
        ..FakeAuth::default()
    };

    let report = authenticate_all(&auth, &env(false), &paths, STEP_TIMEOUT).await;

    let ScenarioOutcome::Failed { reason } = report.outcome() else {
        panic!("expected failure: {report:?}");
    };
    assert!(reason.contains("dashboard after member login"), "{reason}");
    assert!(report.steps.iter().all(|step| step.outcome.is_failed()));
    assert!(!paths.for_role(Role::Member).exists());
}
