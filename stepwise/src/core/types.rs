//! Shared deterministic types for the step engine.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unit of work submitted by a caller. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Task {
    description: String,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Closed set of step executors a plan may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    /// External action tool that persists an email draft.
    #[serde(rename = "emailSender")]
    EmailSender,
    /// Free-form generative reasoning call.
    #[serde(rename = "LLM")]
    Llm,
}

impl StepKind {
    pub const ALL: [StepKind; 2] = [StepKind::EmailSender, StepKind::Llm];

    /// Name used in plan text (`#E1 = emailSender[...]`).
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::EmailSender => "emailSender",
            StepKind::Llm => "LLM",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of plan execution bound to a named result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Free-text rationale. Logged, never evaluated.
    pub description: String,
    /// Symbolic name (e.g. `#E1`) the step's output is stored under.
    pub result_name: String,
    pub kind: StepKind,
    /// Input text; may reference earlier `result_name`s.
    pub input: String,
}

/// Ordered, immutable sequence of steps produced once by a planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    steps: Vec<Step>,
    raw: String,
}

impl Plan {
    pub(crate) fn new(steps: Vec<Step>, raw: impl Into<String>) -> Self {
        Self {
            steps,
            raw: raw.into(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Step at 1-based `position`.
    pub fn step(&self, position: usize) -> Option<&Step> {
        position.checked_sub(1).and_then(|idx| self.steps.get(idx))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Planner text the steps were parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Lifecycle phase shared by both workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Running,
    Solving,
    Done,
}

/// Moderation checks known to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Toxicity,
    SensitiveTopic,
}

impl CheckKind {
    pub const ALL: [CheckKind; 2] = [CheckKind::Toxicity, CheckKind::SensitiveTopic];

    /// Worker name used in routing prompts and conversation messages.
    pub fn member_name(self) -> &'static str {
        match self {
            CheckKind::Toxicity => "ToxicityChecker",
            CheckKind::SensitiveTopic => "SensitiveTopicChecker",
        }
    }

    pub fn from_member_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.member_name() == name)
    }

    /// Human label used in pass messages.
    pub fn label(self) -> &'static str {
        match self {
            CheckKind::Toxicity => "Toxicity",
            CheckKind::SensitiveTopic => "Sensitive topic",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.member_name())
    }
}

/// One entry in a moderation conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// `user` for the input, otherwise the member name of the check.
    pub author: String,
    pub content: String,
}

impl Message {
    pub const USER: &'static str = "user";

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            author: Self::USER.to_string(),
            content: content.into(),
        }
    }

    pub fn from_check(kind: CheckKind, content: impl Into<String>) -> Self {
        Self {
            author: kind.member_name().to_string(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.author == Self::USER
    }
}

/// Verdict produced by a moderation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum CheckOutcome {
    Pass { message: String },
    Fail { reason: String },
}

impl CheckOutcome {
    pub fn is_fail(&self) -> bool {
        matches!(self, CheckOutcome::Fail { .. })
    }
}

/// Routing decision taken after a passing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteDecision {
    Check(CheckKind),
    Finish,
}

impl RouteDecision {
    pub const FINISH: &'static str = "FINISH";

    pub fn as_str(self) -> &'static str {
        match self {
            RouteDecision::Check(kind) => kind.member_name(),
            RouteDecision::Finish => Self::FINISH,
        }
    }
}
