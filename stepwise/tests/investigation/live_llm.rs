//! Live runs of both workflows through `CommandGenerator`.
//!
//! # Prerequisites
//!
//! - A completion command that reads the prompt on stdin and prints the
//!   completion, e.g. the `llm` CLI (`pipx install llm`) with a configured key.
//! - `STEPWISE_LLM_COMMAND` set to the command line, e.g. `llm -m gpt-4o-mini`.
//!   Defaults to `llm`.
//!
//! # Running
//!
//! ```bash
//! # Run all investigation tests
//! STEPWISE_LLM_COMMAND="llm -m gpt-4o-mini" cargo test --test investigation_llm -- --ignored
//!
//! # Run specific test
//! cargo test --test investigation_llm live_planner_output_parses -- --ignored
//! ```

use std::fs;
use std::time::{Duration, Instant};

use stepwise::agents::checks::CheckRunner;
use stepwise::agents::plan_solve::PlanSolveWorkflow;
use stepwise::agents::planner::{LlmPlanner, plan_task};
use stepwise::agents::supervisor::{LlmRouter, ModerationWorkflow};
use stepwise::core::email_format::EmailDraft;
use stepwise::core::types::{CheckKind, StepKind, Task};
use stepwise::io::classifier::LexiconClassifier;
use stepwise::io::config::StepwiseConfig;
use stepwise::io::email_tool::EmailFileTool;
use stepwise::io::generator::CommandGenerator;

/// Upper bound for one completion (LLM latency varies a lot).
const CALL_TIMEOUT: Duration = Duration::from_secs(90);

const RUN_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const MEETING_TASK: &str = "send an email to saad@gmail.com to remind him of our meeting \
                            tomorrow at the office at 10 am";

fn live_generator() -> CommandGenerator {
    let command = std::env::var("STEPWISE_LLM_COMMAND").unwrap_or_else(|_| "llm".to_string());
    let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    assert!(!argv.is_empty(), "STEPWISE_LLM_COMMAND is empty");
    CommandGenerator::new(argv, 100_000)
}

/// Verifies a live planner reply yields at least one step of a known kind.
#[test]
#[ignore]
fn live_planner_output_parses() {
    let generator = live_generator();
    let planner = LlmPlanner::new(&generator);
    let task = Task::new(MEETING_TASK);

    let parsed =
        plan_task(&planner, &task, Instant::now() + RUN_TIMEOUT, CALL_TIMEOUT).expect("plan");

    println!("{}", parsed.plan.raw());
    for dropped in &parsed.dropped {
        println!("dropped line {}: {:?}", dropped.line, dropped.reason);
    }
    assert!(!parsed.plan.is_empty(), "planner produced no usable steps");
    assert!(
        parsed
            .plan
            .steps()
            .iter()
            .any(|step| step.kind == StepKind::EmailSender),
        "expected an emailSender step"
    );
}

/// Verifies the email task saves a draft addressed to the task's recipient.
#[test]
#[ignore]
fn live_email_task_saves_draft() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output_path = temp.path().join("email_data.json");
    let generator = live_generator();
    let workflow = PlanSolveWorkflow::new(
        LlmPlanner::new(&generator),
        &generator,
        EmailFileTool::new(&output_path),
        CALL_TIMEOUT,
    );

    let run = workflow
        .solve(Task::new(MEETING_TASK), RUN_TIMEOUT)
        .expect("solve");

    println!("final: {}", run.final_result().unwrap_or_default());
    let draft: EmailDraft =
        serde_json::from_str(&fs::read_to_string(&output_path).expect("read")).expect("parse");
    assert_eq!(draft.receiver, "saad@gmail.com");
    assert!(!draft.content.is_empty());
}

/// Verifies the model-driven router finishes on benign input.
#[test]
#[ignore]
fn live_router_finishes_clean_input() {
    let generator = live_generator();
    let cfg = StepwiseConfig::default();
    let workflow = ModerationWorkflow::new(
        LlmRouter::new(&generator, CheckKind::ALL.to_vec()),
        CheckRunner::new(
            LexiconClassifier,
            &generator,
            cfg.moderation.policies(),
            CALL_TIMEOUT,
        ),
        CALL_TIMEOUT,
        cfg.max_route_steps,
    );

    let run = workflow
        .moderate("What is a good name for a pet turtle?", RUN_TIMEOUT)
        .expect("moderate");

    println!("final: {}", run.final_result().unwrap_or_default());
    assert!(!run.is_rejected());
    assert!(!run.checks_run().is_empty());
}
