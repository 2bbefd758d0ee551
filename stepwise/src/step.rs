//! A single `route -> execute` iteration shared by both workflows.

use std::fmt;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::error::EngineError;

/// A step-sequenced workflow driven by [`crate::looping::run_loop`].
///
/// The engine owns no workflow state: each run creates its own `State` and
/// the workflow only routes and executes against it.
pub trait Workflow {
    type State;
    type Action: fmt::Debug + Clone;

    /// Short name used in logs and run records.
    fn name(&self) -> &'static str;

    /// True once the run holds its terminal result.
    fn is_done(&self, state: &Self::State) -> bool;

    /// Monotone counter that every executed action must advance.
    fn progress(&self, state: &Self::State) -> usize;

    /// Upper bound on executed actions for this run.
    fn max_iterations(&self, state: &Self::State) -> u32;

    /// Decide the next action, or `None` when nothing is left to do.
    fn route(
        &self,
        state: &Self::State,
        deadline: Instant,
    ) -> Result<Option<Self::Action>, EngineError>;

    /// Perform `action`, mutating `state`.
    fn execute(
        &self,
        state: &mut Self::State,
        action: &Self::Action,
        deadline: Instant,
    ) -> Result<(), EngineError>;
}

/// Result of a single iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome<A> {
    /// Iteration number (1-indexed).
    pub iter: u32,
    pub action: A,
    /// Progress counter after the action.
    pub progress: usize,
    pub duration_ms: u64,
}

/// Route once and execute the chosen action.
///
/// Returns `Ok(None)` when the router has nothing left to do. Fails with
/// [`EngineError::NoProgress`] when the action leaves the progress counter
/// where it was.
#[instrument(skip_all, fields(workflow = workflow.name(), iter))]
pub fn run_step<W: Workflow>(
    workflow: &W,
    state: &mut W::State,
    iter: u32,
    deadline: Instant,
) -> Result<Option<StepOutcome<W::Action>>, EngineError> {
    let start = Instant::now();
    let Some(action) = workflow.route(state, deadline)? else {
        return Ok(None);
    };
    debug!(?action, "routed");

    let before = workflow.progress(state);
    workflow.execute(state, &action, deadline)?;
    let after = workflow.progress(state);
    if after <= before {
        return Err(EngineError::NoProgress(format!(
            "{action:?} left progress at {before}"
        )));
    }

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    debug!(progress = after, duration_ms, "step finished");
    Ok(Some(StepOutcome {
        iter,
        action,
        progress: after,
        duration_ms,
    }))
}
