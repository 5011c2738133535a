//! Tracing setup for suite runs and the maintenance CLI.
//!
//! Diagnostics go to stderr so `suite store show` output stays pipeable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` if unset, so prerequisite, retrieval
/// and gate decisions are visible in CI logs.
///
/// # Example
/// ```bash
/// RUST_LOG=suite=debug suite store show
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
