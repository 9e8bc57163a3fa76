//! Stable exit codes for stepwise CLI commands.

/// Command succeeded; the goal or command completed.
pub const OK: i32 = 0;
/// Invalid input: unreadable config, malformed plan file, bad arguments.
pub const INVALID: i32 = 1;
/// The goal or command ran but did not succeed (includes denial).
pub const FAILED: i32 = 2;
/// `stepwise verify` flagged the command as dangerous.
pub const UNSAFE: i32 = 3;
