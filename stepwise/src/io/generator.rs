//! Generator abstraction for generative-reasoning calls.
//!
//! The [`Generator`] trait decouples the engines from the model backend
//! (a configured command reading the prompt on stdin). Tests use scripted
//! generators that return predetermined completions without spawning
//! processes.

use std::process::Command;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::core::budget::call_timeout;
use crate::error::GenerationError;
use crate::io::process::run_command_with_timeout;

const STDERR_EXCERPT_CHARS: usize = 400;

/// Parameters for a single completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Prompt text fed to the model.
    pub prompt: String,
    /// Maximum time to wait for the completion.
    pub timeout: Duration,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            prompt: prompt.into(),
            timeout,
        }
    }
}

/// Abstraction over generative backends.
pub trait Generator {
    /// Complete `request.prompt`, returning the model's text.
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

impl<G: Generator + ?Sized> Generator for &G {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        (**self).complete(request)
    }
}

/// Generator that pipes the prompt to an external command.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    command: Vec<String>,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(command: Vec<String>, output_limit_bytes: usize) -> Self {
        Self {
            command,
            output_limit_bytes,
        }
    }
}

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(GenerationError::Failed(
                "generator command is empty".to_string(),
            ));
        };
        info!(program = %program, prompt_bytes = request.prompt.len(), "starting completion");

        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| GenerationError::Failed(format!("{err:#}")))?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "completion timed out"
            );
            return Err(GenerationError::Timeout(request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "completion command failed");
            return Err(GenerationError::Failed(format!(
                "{program} exited with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(STDERR_EXCERPT_CHARS)
            )));
        }

        let text = output.stdout_text();
        if text.is_empty() {
            return Err(GenerationError::Empty);
        }
        debug!(completion_bytes = text.len(), "completion finished");
        Ok(text)
    }
}

/// Complete `prompt` within whatever remains of the run budget.
///
/// The call gets `min(per_call, deadline - now)`; an exhausted budget is
/// reported as a timeout without calling the generator.
pub fn complete_within<G: Generator + ?Sized>(
    generator: &G,
    prompt: String,
    deadline: Instant,
    per_call: Duration,
) -> Result<String, GenerationError> {
    let Some(timeout) = call_timeout(deadline, per_call) else {
        return Err(GenerationError::Timeout(Duration::ZERO));
    };
    generator.complete(&CompletionRequest::new(prompt, timeout))
}
