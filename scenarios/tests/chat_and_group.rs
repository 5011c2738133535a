//! Chat and group lifecycle chains against in-memory application fakes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use scenarios::chat::{CHAT_CHAIN, ChatContext, ChatSession, chat_chain};
use scenarios::group::{GROUP_CHAIN, GroupApp, activate, group_lifecycle_chain};
use suite::core::datagen::RunSlot;
use suite::core::types::{GroupLookup, ScenarioOutcome};
use suite::io::runtime_store::RuntimeStore;
use suite::scenario::MISSING_CONTEXT_REASON;

const STEP_TIMEOUT: Duration = Duration::from_secs(180);

/// Group chats shared by every session opened on it.
#[derive(Default)]
struct Board {
    chats: Mutex<HashMap<String, Vec<String>>>,
}

impl Board {
    fn with_group(self, group: &str, messages: &[&str]) -> Self {
        self.chats.lock().unwrap().insert(
            group.to_string(),
            messages.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    fn messages(&self, group: &str) -> Vec<String> {
        self.chats
            .lock()
            .unwrap()
            .get(group)
            .cloned()
            .unwrap_or_default()
    }
}

struct FakeChat<'a> {
    board: &'a Board,
    open: Mutex<Option<String>>,
}

impl<'a> FakeChat<'a> {
    fn new(board: &'a Board) -> Self {
        Self {
            board,
            open: Mutex::new(None),
        }
    }

    fn open_group(&self) -> Result<String> {
        self.open
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("no chat open"))
    }
}

impl ChatSession for FakeChat<'_> {
    async fn open_group_chat(&self, group: &str) -> Result<()> {
        if !self.board.chats.lock().unwrap().contains_key(group) {
            bail!("group {group:?} not in My Groups");
        }
        *self.open.lock().unwrap() = Some(group.to_string());
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let group = self.open_group()?;
        self.board
            .chats
            .lock()
            .unwrap()
            .entry(group)
            .or_default()
            .push(text.to_string());
        Ok(())
    }

    async fn visible_messages(&self) -> Result<Vec<String>> {
        Ok(self.board.messages(&self.open_group()?))
    }
}

fn store(temp: &tempfile::TempDir) -> RuntimeStore {
    RuntimeStore::new(temp.path().join("runtime.json"))
}

#[tokio::test(start_paused = true)]
async fn member_message_reaches_leader() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let board = Board::default().with_group("PW_Group_chat", &[]);
    let (member, leader) = (FakeChat::new(&board), FakeChat::new(&board));

    let report = chat_chain(&member, &leader, &store, "PW_Group_chat", RunSlot::default(), STEP_TIMEOUT).await;

    assert_eq!(report.chain, CHAT_CHAIN);
    assert_eq!(report.outcome(), ScenarioOutcome::Passed, "{report:?}");
    let messages = board.messages("PW_Group_chat");
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.starts_with("PW_Chat_")));
    assert_eq!(store.group_name().expect("read").as_deref(), Some("PW_Group_chat"));
    assert_eq!(store.chat_message().expect("read"), Some(messages[0].clone()));
}

#[tokio::test(start_paused = true)]
async fn leader_skips_without_member_context() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let board = Board::default();
    let (member, leader) = (FakeChat::new(&board), FakeChat::new(&board));

    let report = chat_chain(&member, &leader, &store, "PW_Group_gone", RunSlot::default(), STEP_TIMEOUT).await;

    assert!(report.steps[0].outcome.is_failed());
    assert_eq!(
        report.steps[1].outcome,
        ScenarioOutcome::Skipped {
            reason: MISSING_CONTEXT_REASON.to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn leader_falls_back_to_stored_context() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    store.save_group_name("PW_Group_earlier").expect("save");
    store.save_chat_message("hello from an earlier run").expect("save");
    let board = Board::default().with_group("PW_Group_earlier", &["hello from an earlier run"]);
    let (member, leader) = (FakeChat::new(&board), FakeChat::new(&board));

    let report = chat_chain(&member, &leader, &store, "PW_Group_gone", RunSlot::default(), STEP_TIMEOUT).await;

    assert!(report.steps[0].outcome.is_failed());
    assert!(report.steps[1].outcome.is_passed(), "{report:?}");
    assert_eq!(board.messages("PW_Group_earlier").len(), 2);
    assert_eq!(
        ChatContext::from_store(&store),
        Some(ChatContext {
            group_name: "PW_Group_earlier".to_string(),
            message: "hello from an earlier run".to_string(),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn leader_fails_when_message_never_renders() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let member_board = Board::default().with_group("PW_Group_split", &[]);
    let leader_board = Board::default().with_group("PW_Group_split", &["old message"]);
    let member = FakeChat::new(&member_board);
    let leader = FakeChat::new(&leader_board);

    let report = chat_chain(&member, &leader, &store, "PW_Group_split", RunSlot::default(), STEP_TIMEOUT).await;

    assert!(report.steps[0].outcome.is_passed());
    let ScenarioOutcome::Failed { reason } = &report.steps[1].outcome else {
        panic!("leader step should fail: {report:?}");
    };
    assert!(reason.contains("not visible"), "{reason}");
    assert!(reason.contains("old message"), "{reason}");
}

#[derive(Default)]
struct FakeGroups {
    listed: Mutex<Vec<String>>,
    lose_created: bool,
    activated: Mutex<Vec<usize>>,
    configured: Mutex<Vec<String>>,
    sessions: Mutex<Vec<(String, String)>>,
}

impl FakeGroups {
    fn listing(names: &[&str]) -> Self {
        Self {
            listed: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            ..Self::default()
        }
    }
}

impl GroupApp for FakeGroups {
    async fn create_group(&self, name: &str, _description: &str) -> Result<()> {
        if !self.lose_created {
            self.listed.lock().unwrap().push(name.to_string());
        }
        Ok(())
    }

    async fn find_group(&self, name: &str) -> Result<GroupLookup> {
        let listed = self.listed.lock().unwrap();
        Ok(match listed.iter().position(|listed| listed == name) {
            Some(position) => GroupLookup::Found {
                name: name.to_string(),
                position,
            },
            None => GroupLookup::NotFound {
                name: name.to_string(),
            },
        })
    }

    async fn activate_group(&self, position: usize) -> Result<()> {
        self.activated.lock().unwrap().push(position);
        Ok(())
    }

    async fn configure_free_membership(&self, name: &str) -> Result<()> {
        self.configured.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn create_session(&self, group: &str, title: &str) -> Result<()> {
        self.sessions
            .lock()
            .unwrap()
            .push((group.to_string(), title.to_string()));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn group_lifecycle_runs_every_step() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let app = FakeGroups::listing(&["Someone else's group"]);

    let report = group_lifecycle_chain(&app, &store, RunSlot::new(1, 2), STEP_TIMEOUT).await;

    assert_eq!(report.chain, GROUP_CHAIN);
    assert_eq!(report.outcome(), ScenarioOutcome::Passed, "{report:?}");
    assert_eq!(report.steps.len(), 4);
    let name = store.group_name().expect("read").expect("stored group");
    assert!(name.starts_with("PW_Group_"));
    assert!(name.contains("w1r2"));
    assert_eq!(*app.activated.lock().unwrap(), vec![1]);
    assert_eq!(*app.configured.lock().unwrap(), vec![name.clone()]);
    let sessions = app.sessions.lock().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].0, name);
    assert!(sessions[0].1.starts_with("Session "));
}

#[tokio::test(start_paused = true)]
async fn missing_group_fails_activation_and_skips_dependents() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = store(&temp);
    let app = FakeGroups {
        lose_created: true,
        ..FakeGroups::default()
    };

    let report = group_lifecycle_chain(&app, &store, RunSlot::default(), STEP_TIMEOUT).await;

    assert!(report.step("create group").expect("step").outcome.is_passed());
    let ScenarioOutcome::Failed { reason } = &report.step("activate group").expect("step").outcome
    else {
        panic!("activation should fail: {report:?}");
    };
    assert!(reason.contains("not found in My Groups"), "{reason}");
    assert!(report.step("configure membership").expect("step").outcome.is_skipped());
    assert!(report.step("create session").expect("step").outcome.is_skipped());
    assert!(app.activated.lock().unwrap().is_empty());
}

#[tokio::test]
async fn activate_uses_listing_position() {
    let app = FakeGroups::listing(&["a", "b", "PW_Group_target"]);

    let position = activate(&app, "PW_Group_target").await.expect("activate");

    assert_eq!(position, 2);
    assert_eq!(*app.activated.lock().unwrap(), vec![2]);
}
