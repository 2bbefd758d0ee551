//! Scripted collaborators for engine tests.
//!
//! Each fake replays a queue of canned responses and records what it was
//! asked, so tests can assert on both the run state and the calls made.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use crate::agents::planner::Planner;
use crate::agents::supervisor::{ModerationRun, Router};
use crate::core::types::{CheckOutcome, RouteDecision, Step, StepKind, Task};
use crate::error::{ClassifierError, EngineError, GenerationError, ToolError};
use crate::io::classifier::{CheckPolicy, ContentClassifier};
use crate::io::email_tool::ActionTool;
use crate::io::generator::{CompletionRequest, Generator};

/// Generator replaying queued completions in order.
pub struct ScriptedGenerator {
    replies: RefCell<VecDeque<Result<String, GenerationError>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn from_results(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl Generator for ScriptedGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.prompts.borrow_mut().push(request.prompt.clone());
        self.replies.borrow_mut().pop_front().unwrap_or_else(|| {
            Err(GenerationError::Failed(
                "scripted generator exhausted".to_string(),
            ))
        })
    }
}

/// Planner returning a fixed reply.
pub struct ScriptedPlanner {
    reply: Result<String, GenerationError>,
    calls: Cell<usize>,
}

impl ScriptedPlanner {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            reply: Ok(raw.into()),
            calls: Cell::new(0),
        }
    }

    pub fn failing(err: GenerationError) -> Self {
        Self {
            reply: Err(err),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&self, _task: &Task, _timeout: Duration) -> Result<String, GenerationError> {
        self.calls.set(self.calls.get() + 1);
        self.reply.clone()
    }
}

/// Action tool recording payloads and returning a fixed reply.
pub struct RecordingTool {
    reply: Result<String, ToolError>,
    payloads: RefCell<Vec<String>>,
}

impl RecordingTool {
    pub fn succeeding() -> Self {
        Self::replying(Ok("Email data saved successfully".to_string()))
    }

    pub fn failing(err: ToolError) -> Self {
        Self::replying(Err(err))
    }

    fn replying(reply: Result<String, ToolError>) -> Self {
        Self {
            reply,
            payloads: RefCell::new(Vec::new()),
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.borrow().clone()
    }
}

impl ActionTool for RecordingTool {
    fn invoke(&self, payload: &str) -> Result<String, ToolError> {
        self.payloads.borrow_mut().push(payload.to_string());
        self.reply.clone()
    }
}

/// Classifier replaying queued verdicts; passes once the queue is empty.
pub struct ScriptedClassifier {
    outcomes: RefCell<VecDeque<Result<CheckOutcome, ClassifierError>>>,
    checked: RefCell<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn new(outcomes: Vec<Result<CheckOutcome, ClassifierError>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            checked: RefCell::new(Vec::new()),
        }
    }

    pub fn passing() -> Self {
        Self::new(Vec::new())
    }

    /// Texts submitted for checking, in call order.
    pub fn checked(&self) -> Vec<String> {
        self.checked.borrow().clone()
    }
}

impl ContentClassifier for ScriptedClassifier {
    fn check(&self, text: &str, _policy: &CheckPolicy) -> Result<CheckOutcome, ClassifierError> {
        self.checked.borrow_mut().push(text.to_string());
        self.outcomes.borrow_mut().pop_front().unwrap_or_else(|| {
            Ok(CheckOutcome::Pass {
                message: "scripted pass".to_string(),
            })
        })
    }
}

/// Router replaying queued decisions.
pub struct ScriptedRouter {
    decisions: RefCell<VecDeque<Result<RouteDecision, EngineError>>>,
    calls: Cell<usize>,
}

impl ScriptedRouter {
    pub fn new(decisions: Vec<Result<RouteDecision, EngineError>>) -> Self {
        Self {
            decisions: RefCell::new(decisions.into()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Router for ScriptedRouter {
    fn route(
        &self,
        _run: &ModerationRun,
        _timeout: Duration,
    ) -> Result<RouteDecision, EngineError> {
        self.calls.set(self.calls.get() + 1);
        match self.decisions.borrow_mut().pop_front() {
            Some(decision) => decision,
            None => Err(EngineError::Routing("router script exhausted".into())),
        }
    }
}

/// Create a deterministic step with a generic rationale.
pub fn step(result_name: &str, kind: StepKind, input: &str) -> Step {
    Step {
        description: format!("produce {result_name}"),
        result_name: result_name.to_string(),
        kind,
        input: input.to_string(),
    }
}

/// Render steps as planner text (`Plan:` line followed by its binding).
pub fn plan_text(steps: &[Step]) -> String {
    steps
        .iter()
        .map(|s| {
            format!(
                "Plan: {}\n{} = {}[{}]\n",
                s.description, s.result_name, s.kind, s.input
            )
        })
        .collect()
}
