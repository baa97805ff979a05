//! Stable exit codes for the crawler CLI.

/// Run finished: clean, problems reported, or retries exhausted.
pub const OK: i32 = 0;
/// Path could not be inspected, or configuration/arguments were invalid.
pub const INVALID: i32 = 1;
/// The package manager failed to add missing modules.
pub const INSTALL_FAILED: i32 = 2;
