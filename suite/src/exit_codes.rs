//! Stable exit codes for the `suite` CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments, config, or store contents, or any other error.
pub const INVALID: i32 = 1;
/// `suite store get` found no value for the key.
pub const NOT_FOUND: i32 = 2;
