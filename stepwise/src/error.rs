//! Error taxonomy for the step engine and its collaborators.
//!
//! Tool-level errors are recorded as step results and never abort a run.
//! Planning and generation errors abort plan-and-solve runs and name the stage
//! that failed so callers can retry externally.

use std::time::Duration;

use thiserror::Error;

/// Plan text could not be turned into a usable plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("duplicate result name '{name}' on line {line} (first bound on line {first_line})")]
    DuplicateResultName {
        name: String,
        line: usize,
        first_line: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("result '{name}' is already bound")]
    AlreadyBound { name: String },
}

/// Failure reported by an external action tool.
///
/// The display text is the outcome string recorded as the step result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Payload parsed but required fields are missing.
    #[error("{0}")]
    Validation(String),
    /// Payload is not parseable as structured data.
    #[error("{0}")]
    Format(String),
    /// Any other failure while performing the action.
    #[error("{0}")]
    Failed(String),
}

/// Failure of a generative-reasoning call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation failed: {0}")]
    Failed(String),
    #[error("generation returned empty output")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier failed: {0}")]
    Failed(String),
}

/// Run-level failure surfaced to the caller of an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("planning failed")]
    Planning {
        #[source]
        source: GenerationError,
    },
    #[error("plan parse failed")]
    PlanParse(#[from] ParseError),
    #[error("generation failed at {stage}")]
    Generation {
        stage: String,
        #[source]
        source: GenerationError,
    },
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("render prompt")]
    Prompt(#[from] minijinja::Error),
    #[error("no progress: {0}")]
    NoProgress(String),
    #[error("routing failed: {0}")]
    Routing(String),
    #[error("{stage} timed out")]
    Timeout { stage: String },
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    /// Map a generation failure at `stage`, keeping timeouts distinct.
    pub fn generation(stage: impl Into<String>, source: GenerationError) -> Self {
        let stage = stage.into();
        match source {
            GenerationError::Timeout(_) => EngineError::Timeout { stage },
            source => EngineError::Generation { stage, source },
        }
    }

    /// Map a planner failure, keeping timeouts distinct.
    pub fn planning(source: GenerationError) -> Self {
        match source {
            GenerationError::Timeout(_) => EngineError::Timeout {
                stage: "plan".to_string(),
            },
            source => EngineError::Planning { source },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout { .. })
    }
}
