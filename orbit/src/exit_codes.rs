//! Stable exit codes for orbit CLI commands.

/// Command succeeded (or the user declined the plan).
pub const OK: i32 = 0;
/// Startup failed: missing credential, invalid config or other fatal errors.
pub const INVALID: i32 = 1;
/// Planning failed after retries; nothing ran.
pub const PLAN_FAILED: i32 = 2;
/// The plan ran but at least one step failed or was blocked.
pub const STEPS_FAILED: i32 = 3;
