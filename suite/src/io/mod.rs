//! I/O seams and persistent state for the suite.

pub mod app;
mod atomic_file;
pub mod config;
pub mod env;
pub mod inbox;
pub mod runtime_store;
pub mod session_state;
pub mod test_data;
