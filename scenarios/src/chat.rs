//! Group chat send/receive between a member and the group leader.
//!
//! The member sends a generated message; the leader opens the same group and
//! must see it before replying. The two steps share the group name and message
//! through [`ChatContext`].

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use suite::core::datagen::RunSlot;
use suite::io::runtime_store::RuntimeStore;
use suite::io::test_data;
use suite::scenario::{ChainReport, ChainRunner};

pub const CHAT_CHAIN: &str = "chat-send-message";

const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(15);
const VISIBILITY_POLL: Duration = Duration::from_millis(500);

/// A logged-in role's view of group chat.
#[allow(async_fn_in_trait)]
pub trait ChatSession {
    /// Open "My Groups" and enter the chat of `group`.
    async fn open_group_chat(&self, group: &str) -> Result<()>;

    async fn send_message(&self, text: &str) -> Result<()>;

    /// Message texts currently rendered in the open chat.
    async fn visible_messages(&self) -> Result<Vec<String>>;
}

/// Data the leader step needs from the member step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatContext {
    pub group_name: String,
    pub message: String,
}

impl ChatContext {
    /// Rebuild the context from facts an earlier run recorded.
    pub fn from_store(store: &RuntimeStore) -> Option<Self> {
        let group_name = store.group_name().ok().flatten()?;
        let message = store.chat_message().ok().flatten()?;
        Some(Self {
            group_name,
            message,
        })
    }
}

/// Poll the open chat until `text` is rendered.
pub async fn wait_for_message<S: ChatSession>(session: &S, text: &str) -> Result<()> {
    let mut last_seen: Vec<String> = Vec::new();
    let found = timeout(VISIBILITY_TIMEOUT, async {
        loop {
            match session.visible_messages().await {
                Ok(messages) => {
                    if messages.iter().any(|message| message.contains(text)) {
                        return;
                    }
                    last_seen = messages;
                }
                Err(err) => debug!(err = %format!("{err:#}"), "chat not readable yet"),
            }
            sleep(VISIBILITY_POLL).await;
        }
    })
    .await;
    found.map_err(|_| {
        anyhow!(
            "message {text:?} not visible after {VISIBILITY_TIMEOUT:?}; last messages: {:?}",
            last_seen.iter().rev().take(3).collect::<Vec<_>>()
        )
    })
}

/// Member sends, leader verifies and replies.
///
/// When the member step fails, the leader step falls back to the facts in the
/// store and is skipped only when those are missing too.
pub async fn chat_chain<M, L>(
    member: &M,
    leader: &L,
    store: &RuntimeStore,
    group_name: &str,
    slot: RunSlot,
    step_timeout: Duration,
) -> ChainReport
where
    M: ChatSession,
    L: ChatSession,
{
    let mut runner = ChainRunner::new(CHAT_CHAIN, step_timeout);

    let sent = runner
        .step("member sends a message", async {
            let message = test_data::chat_message(slot);
            member
                .open_group_chat(group_name)
                .await
                .with_context(|| format!("open group {group_name:?} as member"))?;
            member.send_message(&message).await.context("send message")?;
            wait_for_message(member, &message).await?;
            store.save_group_name(group_name)?;
            store.save_chat_message(&message)?;
            anyhow::Ok(ChatContext {
                group_name: group_name.to_string(),
                message,
            })
        })
        .await;

    let context = match sent {
        Some(context) => Some(context),
        None => {
            let stored = ChatContext::from_store(store);
            if stored.is_some() {
                warn!("member step did not pass, using chat facts from the store");
            }
            stored
        }
    };

    runner
        .step_with("leader receives and replies", context, |context| async move {
            leader
                .open_group_chat(&context.group_name)
                .await
                .with_context(|| format!("open group {:?} as leader", context.group_name))?;
            wait_for_message(leader, &context.message).await?;
            let reply = test_data::chat_message(slot);
            leader.send_message(&reply).await.context("send reply")?;
            info!(group = %context.group_name, "leader replied");
            anyhow::Ok(reply)
        })
        .await;

    runner.finish()
}
