//! Plan-and-solve workflow: plan once, execute each step, consolidate once.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument};

use crate::agents::executor::StepExecutor;
use crate::agents::planner::{Planner, plan_task};
use crate::core::context_store::ContextStore;
use crate::core::plan_parser::{DroppedLine, ParsedPlan};
use crate::core::router::{PlanAction, next_plan_action, phase_for};
use crate::core::types::{Plan, RunPhase, Task};
use crate::error::EngineError;
use crate::io::email_tool::ActionTool;
use crate::io::generator::{Generator, complete_within};
use crate::io::prompt::PromptEngine;
use crate::looping::{LoopOutcome, run_loop};
use crate::step::{StepOutcome, Workflow};

/// State of one plan-and-solve run. Owned by that run only.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRun {
    task: Task,
    plan: Plan,
    dropped: Vec<DroppedLine>,
    results: ContextStore,
    final_result: Option<String>,
}

impl PlanRun {
    pub fn new(task: Task, parsed: ParsedPlan) -> Self {
        Self {
            task,
            plan: parsed.plan,
            dropped: parsed.dropped,
            results: ContextStore::new(),
            final_result: None,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Plan lines the parser could not use.
    pub fn dropped(&self) -> &[DroppedLine] {
        &self.dropped
    }

    pub fn results(&self) -> &ContextStore {
        &self.results
    }

    pub fn final_result(&self) -> Option<&str> {
        self.final_result.as_deref()
    }

    pub fn phase(&self) -> RunPhase {
        phase_for(
            self.plan.len(),
            self.results.len(),
            self.final_result.is_some(),
        )
    }

    fn finish(&mut self, result: String) -> Result<(), EngineError> {
        if self.final_result.is_some() {
            return Err(EngineError::Invariant(
                "plan run already holds a final result".to_string(),
            ));
        }
        self.final_result = Some(result);
        Ok(())
    }
}

/// Plan-and-solve pipeline over injected collaborators.
pub struct PlanSolveWorkflow<P, G, T> {
    planner: P,
    executor: StepExecutor<G, T>,
    prompts: PromptEngine,
}

impl<P: Planner, G: Generator, T: ActionTool> PlanSolveWorkflow<P, G, T> {
    pub fn new(planner: P, generator: G, email_tool: T, call_timeout: Duration) -> Self {
        Self {
            planner,
            executor: StepExecutor::new(generator, email_tool, call_timeout),
            prompts: PromptEngine::new(),
        }
    }

    /// Ask the planner for a plan and set up a fresh run.
    pub fn plan(&self, task: Task, deadline: Instant) -> Result<PlanRun, EngineError> {
        let parsed = plan_task(&self.planner, &task, deadline, self.executor.call_timeout())?;
        Ok(PlanRun::new(task, parsed))
    }

    /// Execute every step of `run`, then solve.
    pub fn run<F: FnMut(&StepOutcome<PlanAction>)>(
        &self,
        run: &mut PlanRun,
        deadline: Instant,
        on_step: F,
    ) -> Result<LoopOutcome, EngineError> {
        run_loop(self, run, deadline, on_step)
    }

    /// Plan, execute and solve `task` within `run_timeout`.
    #[instrument(skip_all)]
    pub fn solve(&self, task: Task, run_timeout: Duration) -> Result<PlanRun, EngineError> {
        let deadline = Instant::now() + run_timeout;
        let mut run = self.plan(task, deadline)?;
        self.run(&mut run, deadline, |_| {})?;
        Ok(run)
    }

    fn consolidate(&self, run: &PlanRun, deadline: Instant) -> Result<String, EngineError> {
        let prompt = self
            .prompts
            .render_solve(&run.task, &run.plan, &run.results)?;
        complete_within(
            self.executor.generator(),
            prompt,
            deadline,
            self.executor.call_timeout(),
        )
        .map_err(|err| EngineError::generation("solve", err))
    }
}

impl<P: Planner, G: Generator, T: ActionTool> Workflow for PlanSolveWorkflow<P, G, T> {
    type State = PlanRun;
    type Action = PlanAction;

    fn name(&self) -> &'static str {
        "plan_solve"
    }

    fn is_done(&self, state: &PlanRun) -> bool {
        state.phase() == RunPhase::Done
    }

    fn progress(&self, state: &PlanRun) -> usize {
        state.results.len() + usize::from(state.final_result.is_some())
    }

    fn max_iterations(&self, state: &PlanRun) -> u32 {
        u32::try_from(state.plan.len() + 1).unwrap_or(u32::MAX)
    }

    fn route(
        &self,
        state: &PlanRun,
        _deadline: Instant,
    ) -> Result<Option<PlanAction>, EngineError> {
        next_plan_action(
            state.plan.len(),
            state.results.len(),
            state.final_result.is_some(),
        )
        .map_err(EngineError::Invariant)
    }

    fn execute(
        &self,
        state: &mut PlanRun,
        action: &PlanAction,
        deadline: Instant,
    ) -> Result<(), EngineError> {
        match *action {
            PlanAction::Execute(position) => {
                let step = state.plan.step(position).cloned().ok_or_else(|| {
                    EngineError::Invariant(format!("plan has no step {position}"))
                })?;
                self.executor
                    .execute(&state.task, &step, &mut state.results, deadline)
            }
            PlanAction::Solve => {
                let result = self.consolidate(state, deadline)?;
                info!(result_bytes = result.len(), "solved");
                state.finish(result)
            }
        }
    }
}
