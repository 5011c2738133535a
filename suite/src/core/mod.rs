//! Deterministic, pure logic shared by the suite.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (listing rows, message bodies, countdown text) and return
//! deterministic outputs suitable for tests.

pub mod countdown;
pub mod datagen;
pub mod extract;
pub mod types;
