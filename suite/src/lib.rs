//! Prerequisite and session state management for browser end-to-end suites.
//!
//! Scenarios run in any order and in parallel workers. This crate lets them
//! do that without ordering dependencies:
//!
//! - **[`core`]**: Pure logic (fact keys, countdown parsing, delivery filters,
//!   test data generation). No I/O.
//! - **[`io`]**: The runtime fact store, configuration, environment, and the
//!   traits through which the live application and the inbox are driven.
//!
//! On top of those, [`resolver`] guarantees user prerequisites, [`retriever`]
//! pulls one-time codes and links out of the inbox, [`gate`] waits out resend
//! cooldowns, and [`scenario`] runs dependent steps as explicit chains.

pub mod core;
pub mod exit_codes;
pub mod gate;
pub mod io;
pub mod logging;
pub mod resolver;
pub mod retriever;
pub mod scenario;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
