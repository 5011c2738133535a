//! Group lifecycle: create, activate, configure membership, create a session.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

use suite::core::datagen::RunSlot;
use suite::core::types::GroupLookup;
use suite::io::runtime_store::RuntimeStore;
use suite::io::test_data;
use suite::scenario::{ChainReport, ChainRunner};

pub const GROUP_CHAIN: &str = "group-lifecycle";

/// Leader-side group management pages.
#[allow(async_fn_in_trait)]
pub trait GroupApp {
    async fn create_group(&self, name: &str, description: &str) -> Result<()>;

    /// Search "My Groups" for `name`.
    async fn find_group(&self, name: &str) -> Result<GroupLookup>;

    /// Open the group at `position` in the listing and complete activation checkout.
    async fn activate_group(&self, position: usize) -> Result<()>;

    async fn configure_free_membership(&self, name: &str) -> Result<()>;

    async fn create_session(&self, group: &str, title: &str) -> Result<()>;
}

/// Locate `name` and activate it. A missing group fails with its name.
pub async fn activate<G: GroupApp>(app: &G, name: &str) -> Result<usize> {
    match app
        .find_group(name)
        .await
        .with_context(|| format!("search for group {name:?}"))?
    {
        GroupLookup::Found { name, position } => {
            app.activate_group(position)
                .await
                .with_context(|| format!("activate group {name:?}"))?;
            info!(group = %name, position, "group activated");
            Ok(position)
        }
        GroupLookup::NotFound { name } => bail!("group {name:?} not found in My Groups"),
    }
}

/// Create a generated group, then run the dependent lifecycle steps on it.
pub async fn group_lifecycle_chain<G: GroupApp>(
    app: &G,
    store: &RuntimeStore,
    slot: RunSlot,
    step_timeout: Duration,
) -> ChainReport {
    let mut runner = ChainRunner::new(GROUP_CHAIN, step_timeout);

    let created = runner
        .step("create group", async {
            let name = test_data::group_name(slot);
            let description = format!("Automated group {}", test_data::token(12));
            app.create_group(&name, &description)
                .await
                .with_context(|| format!("create group {name:?}"))?;
            store.save_group_name(&name)?;
            anyhow::Ok(name)
        })
        .await;

    let activated = runner
        .step_with("activate group", created, |name| async move {
            activate(app, &name).await?;
            anyhow::Ok(name)
        })
        .await;

    let configured = runner
        .step_with("configure membership", activated, |name| async move {
            app.configure_free_membership(&name)
                .await
                .with_context(|| format!("configure membership for {name:?}"))?;
            anyhow::Ok(name)
        })
        .await;

    runner
        .step_with("create session", configured, |name| async move {
            let title = format!("Session {}", test_data::token(8));
            app.create_session(&name, &title)
                .await
                .with_context(|| format!("create session {title:?} in {name:?}"))
        })
        .await;

    runner.finish()
}
