//! Drives a [`Workflow`] until it holds its terminal result.

use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::error::EngineError;
use crate::step::{StepOutcome, Workflow, run_step};

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub steps_executed: u32,
    pub duration_ms: u64,
}

/// Run `route -> execute` until the workflow reports done.
///
/// Stops with [`EngineError::NoProgress`] when an action does not advance the
/// run or the workflow's iteration cap is reached first, and with
/// [`EngineError::Invariant`] when the router runs dry before the run is done.
/// Any other error from a step aborts the loop unchanged.
#[instrument(skip_all, fields(workflow = workflow.name()))]
pub fn run_loop<W: Workflow, F: FnMut(&StepOutcome<W::Action>)>(
    workflow: &W,
    state: &mut W::State,
    deadline: Instant,
    mut on_step: F,
) -> Result<LoopOutcome, EngineError> {
    let start = Instant::now();
    let max_iterations = workflow.max_iterations(state);
    let mut steps_executed = 0u32;

    while !workflow.is_done(state) {
        if steps_executed >= max_iterations {
            warn!(steps_executed, max_iterations, "iteration cap reached");
            return Err(EngineError::NoProgress(format!(
                "{} did not finish within {max_iterations} iterations",
                workflow.name()
            )));
        }
        match run_step(workflow, state, steps_executed + 1, deadline)? {
            Some(step) => {
                steps_executed += 1;
                on_step(&step);
            }
            None => {
                return Err(EngineError::Invariant(format!(
                    "{} has nothing left to run but holds no result",
                    workflow.name()
                )));
            }
        }
    }

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(steps_executed, duration_ms, "loop finished");
    Ok(LoopOutcome {
        steps_executed,
        duration_ms,
    })
}
