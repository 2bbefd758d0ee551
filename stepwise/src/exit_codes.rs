//! Stable exit codes for `stepwise` CLI commands.

/// Command succeeded (moderation input accepted).
pub const OK: i32 = 0;
/// Invalid config, input or any other failure.
pub const INVALID: i32 = 1;
/// A run stopped without making progress (iteration cap or stalled step).
pub const NO_PROGRESS: i32 = 2;
/// `stepwise moderate` rejected the input.
pub const REJECTED: i32 = 3;
