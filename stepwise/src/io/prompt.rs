//! Prompt rendering for the planner, solver and supervisor calls.

use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::context_store::ContextStore;
use crate::core::types::{CheckKind, Message, Plan, RouteDecision, StepKind, Task};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const SOLVE_TEMPLATE: &str = include_str!("prompts/solve.md");
const SUPERVISOR_TEMPLATE: &str = include_str!("prompts/supervisor.md");

#[derive(Debug, Clone, Serialize)]
struct ToolContext {
    name: &'static str,
    description: &'static str,
}

/// Plan line with evidence substituted, as shown to the solver.
#[derive(Debug, Clone, Serialize)]
struct SolveLine {
    description: String,
    result_name: String,
    kind: &'static str,
    input: String,
}

fn tool_description(kind: StepKind) -> &'static str {
    match kind {
        StepKind::EmailSender => {
            "Worker that saves the email data in a json file. Useful when you need to save the \
             email data (the receiver, subject and content)."
        }
        StepKind::Llm => {
            "A pretrained LLM like yourself. Useful when you need to act with general world \
             knowledge and common sense. Prioritize it when you are confident in solving the \
             problem yourself. Input can be any instruction."
        }
    }
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("solve", SOLVE_TEMPLATE)
            .expect("solve template should be valid");
        env.add_template("supervisor", SUPERVISOR_TEMPLATE)
            .expect("supervisor template should be valid");
        Self { env }
    }

    /// Prompt asking for a `Plan:` / `#E` plan over the registered tools.
    pub fn render_planner(&self, task: &Task) -> Result<String, minijinja::Error> {
        let tools: Vec<ToolContext> = StepKind::ALL
            .into_iter()
            .map(|kind| ToolContext {
                name: kind.as_str(),
                description: tool_description(kind),
            })
            .collect();
        self.env.get_template("planner")?.render(context! {
            tools => tools,
            task => task.description().trim(),
        })
    }

    /// Consolidation prompt: every plan line with bound evidence substituted.
    pub fn render_solve(
        &self,
        task: &Task,
        plan: &Plan,
        store: &ContextStore,
    ) -> Result<String, minijinja::Error> {
        let steps: Vec<SolveLine> = plan
            .steps()
            .iter()
            .map(|step| SolveLine {
                description: store.substitute(&step.description),
                result_name: store.substitute(&step.result_name),
                kind: step.kind.as_str(),
                input: store.substitute(&step.input),
            })
            .collect();
        self.env.get_template("solve")?.render(context! {
            steps => steps,
            task => task.description().trim(),
        })
    }

    /// Routing prompt listing the registered checks and `FINISH`.
    pub fn render_supervisor(
        &self,
        members: &[CheckKind],
        messages: &[Message],
    ) -> Result<String, minijinja::Error> {
        let member_names: Vec<&str> = members.iter().map(|kind| kind.member_name()).collect();
        let mut options = vec![RouteDecision::FINISH];
        options.extend(member_names.iter().copied());
        self.env.get_template("supervisor")?.render(context! {
            members => member_names,
            options => options,
            messages => messages,
        })
    }
}
