//! Shared time budget helpers for deterministic orchestration.

use std::time::{Duration, Instant};

/// Remaining time until `deadline`, or `None` once it has passed.
pub fn remaining_budget(deadline: Instant) -> Option<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return None;
    }
    Some(remaining)
}

/// Timeout for one collaborator call: the smaller of the per-call cap and the
/// remaining run budget.
pub fn call_timeout(deadline: Instant, per_call: Duration) -> Option<Duration> {
    remaining_budget(deadline).map(|remaining| remaining.min(per_call))
}
