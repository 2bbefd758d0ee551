//! Planner agent: turns a task into a parsed plan.

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::core::budget::call_timeout;
use crate::core::plan_parser::{ParsedPlan, parse_plan};
use crate::core::types::Task;
use crate::error::{EngineError, GenerationError};
use crate::io::generator::{CompletionRequest, Generator};
use crate::io::prompt::PromptEngine;

/// Produces raw plan text for a task.
pub trait Planner {
    fn plan(&self, task: &Task, timeout: Duration) -> Result<String, GenerationError>;
}

impl<P: Planner + ?Sized> Planner for &P {
    fn plan(&self, task: &Task, timeout: Duration) -> Result<String, GenerationError> {
        (**self).plan(task, timeout)
    }
}

/// Planner that asks a [`Generator`] for a `Plan:` / `#E` plan.
pub struct LlmPlanner<G> {
    generator: G,
    prompts: PromptEngine,
}

impl<G: Generator> LlmPlanner<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            prompts: PromptEngine::new(),
        }
    }
}

impl<G: Generator> Planner for LlmPlanner<G> {
    fn plan(&self, task: &Task, timeout: Duration) -> Result<String, GenerationError> {
        let prompt = self
            .prompts
            .render_planner(task)
            .map_err(|err| GenerationError::Failed(format!("render planner prompt: {err}")))?;
        self.generator
            .complete(&CompletionRequest::new(prompt, timeout))
    }
}

/// Ask `planner` for a plan within the run budget and parse it.
#[instrument(skip_all)]
pub fn plan_task<P: Planner>(
    planner: &P,
    task: &Task,
    deadline: Instant,
    per_call: Duration,
) -> Result<ParsedPlan, EngineError> {
    let timeout = call_timeout(deadline, per_call).ok_or_else(|| EngineError::Timeout {
        stage: "plan".to_string(),
    })?;
    let raw = planner.plan(task, timeout).map_err(EngineError::planning)?;
    let parsed = parse_plan(&raw)?;
    info!(
        steps = parsed.plan.len(),
        dropped = parsed.dropped_count(),
        "plan ready"
    );
    Ok(parsed)
}
