//! Progress policy for plan-and-solve runs.
//!
//! `current_step = bound + 1` until every step is bound, then exactly one
//! solve. Nothing is scheduled once the run is done.

use crate::core::types::RunPhase;

/// Next unit of work for a plan-and-solve run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// Execute the step at this 1-based position.
    Execute(usize),
    Solve,
}

/// 1-based position of the next step, or `None` when every step is bound.
pub fn current_step(plan_len: usize, bound: usize) -> Option<usize> {
    if bound >= plan_len {
        None
    } else {
        Some(bound + 1)
    }
}

/// Phase implied by the number of bound results.
pub fn phase_for(plan_len: usize, bound: usize, finished: bool) -> RunPhase {
    if finished {
        RunPhase::Done
    } else if current_step(plan_len, bound).is_none() {
        RunPhase::Solving
    } else {
        RunPhase::Running
    }
}

/// Decide the next action. Returns `Ok(None)` once the run is done.
pub fn next_plan_action(
    plan_len: usize,
    bound: usize,
    finished: bool,
) -> Result<Option<PlanAction>, String> {
    if bound > plan_len {
        return Err(format!(
            "{bound} results bound but plan has only {plan_len} steps"
        ));
    }
    Ok(match phase_for(plan_len, bound, finished) {
        RunPhase::Done => None,
        RunPhase::Solving => Some(PlanAction::Solve),
        RunPhase::Running => Some(PlanAction::Execute(bound + 1)),
    })
}
