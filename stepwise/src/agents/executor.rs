//! Executes a single plan step against its collaborator.

use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::core::context_store::ContextStore;
use crate::core::recipient::extract_recipient;
use crate::core::types::{Step, StepKind, Task};
use crate::error::EngineError;
use crate::io::email_tool::{ActionTool, email_payload};
use crate::io::generator::{Generator, complete_within};

/// Dispatches steps by [`StepKind`] and binds their results.
pub struct StepExecutor<G, T> {
    generator: G,
    email_tool: T,
    call_timeout: Duration,
}

impl<G: Generator, T: ActionTool> StepExecutor<G, T> {
    pub fn new(generator: G, email_tool: T, call_timeout: Duration) -> Self {
        Self {
            generator,
            email_tool,
            call_timeout,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Run `step` with its input substituted from `store`, then bind
    /// `step.result_name` to the result.
    ///
    /// Tool failures become the step's result string. Generation failures
    /// abort with the step named as the stage.
    #[instrument(skip_all, fields(result_name = %step.result_name, kind = %step.kind))]
    pub fn execute(
        &self,
        task: &Task,
        step: &Step,
        store: &mut ContextStore,
        deadline: Instant,
    ) -> Result<(), EngineError> {
        let input = store.substitute(&step.input);
        let result = match step.kind {
            StepKind::EmailSender => {
                let receiver = extract_recipient(task.description());
                if receiver.is_empty() {
                    warn!("task names no recipient; sending with an empty receiver");
                }
                match self.email_tool.invoke(&email_payload(&receiver, &input)) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(err = %err, "email tool failed");
                        err.to_string()
                    }
                }
            }
            StepKind::Llm => {
                let stage = format!("step {}", step.result_name);
                complete_within(&self.generator, input, deadline, self.call_timeout)
                    .map_err(|err| EngineError::generation(stage, err))?
            }
        };
        info!(result_bytes = result.len(), "step executed");
        store.bind(step.result_name.clone(), result)?;
        Ok(())
    }
}
