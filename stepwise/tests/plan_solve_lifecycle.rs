//! Lifecycle tests for the plan-and-solve workflow.
//!
//! These drive whole runs (plan, every step, solve) with scripted
//! collaborators and assert on the final run state and the calls made.

use std::fs;
use std::time::{Duration, Instant};

use stepwise::agents::plan_solve::PlanSolveWorkflow;
use stepwise::core::email_format::EmailDraft;
use stepwise::core::plan_parser::DropReason;
use stepwise::core::router::PlanAction;
use stepwise::core::types::{RunPhase, StepKind, Task};
use stepwise::error::{EngineError, GenerationError, ToolError};
use stepwise::io::email_tool::EmailFileTool;
use stepwise::test_support::{RecordingTool, ScriptedGenerator, ScriptedPlanner, plan_text, step};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(60)
}

/// A plan of N steps executes exactly N steps and one solve, in order.
#[test]
fn n_steps_execute_once_each_then_solve_once() {
    let planner = ScriptedPlanner::new(plan_text(&[
        step("#E1", StepKind::Llm, "list three colors"),
        step("#E2", StepKind::Llm, "pick one of #E1"),
        step("#E3", StepKind::Llm, "write a line about #E2"),
    ]));
    let generator = ScriptedGenerator::new(["red, green, blue", "green", "Green grass.", "final"]);
    let tool = RecordingTool::succeeding();
    let workflow = PlanSolveWorkflow::new(&planner, &generator, &tool, CALL_TIMEOUT);

    let mut run = workflow
        .plan(Task::new("write about a color"), deadline())
        .expect("plan");
    let mut actions = Vec::new();
    let outcome = workflow
        .run(&mut run, deadline(), |step| actions.push(step.action))
        .expect("run");

    assert_eq!(planner.calls(), 1);
    assert_eq!(outcome.steps_executed, 4);
    assert_eq!(
        actions,
        vec![
            PlanAction::Execute(1),
            PlanAction::Execute(2),
            PlanAction::Execute(3),
            PlanAction::Solve
        ]
    );
    assert_eq!(generator.calls(), 4);
    assert_eq!(generator.prompts()[1], "pick one of red, green, blue");
    assert_eq!(generator.prompts()[2], "write a line about green");
    assert_eq!(run.results().len(), 3);
    assert_eq!(run.phase(), RunPhase::Done);
    assert_eq!(run.final_result(), Some("final"));
    assert!(tool.payloads().is_empty());
}

/// The canonical two-step email task drafts, saves and consolidates.
#[test]
fn email_task_drafts_saves_and_solves() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output_path = temp.path().join("email_data.json");
    let planner = ScriptedPlanner::new(
        "Plan: Given the receiver and the reminder, draft a professional concise email. \
         #E1 = LLM[draft an email to remind saad@gmail.com of our meeting tomorrow at 10 am]\n\
         Plan: Save the email data in a json file. #E2 = emailSender[#E1]\n",
    );
    let generator = ScriptedGenerator::new([
        "Subject: Meeting Reminder\n\nHi Saad,\n\n\
         A reminder of our meeting tomorrow at 10 am.\n\nBest regards",
        "The reminder email to saad@gmail.com has been saved.",
    ]);
    let workflow = PlanSolveWorkflow::new(
        &planner,
        &generator,
        EmailFileTool::new(&output_path),
        CALL_TIMEOUT,
    );

    let task = Task::new(
        "send an email to saad@gmail.com to remind him of our meeting \
         tomorrow at the office at 10 am",
    );
    let run = workflow
        .solve(task, Duration::from_secs(60))
        .expect("solve");

    assert_eq!(
        run.results().get("#E2"),
        Some("Email data saved successfully for saad@gmail.com")
    );
    assert_eq!(
        run.final_result(),
        Some("The reminder email to saad@gmail.com has been saved.")
    );

    let saved: EmailDraft =
        serde_json::from_str(&fs::read_to_string(&output_path).expect("read")).expect("parse");
    assert_eq!(saved.receiver, "saad@gmail.com");
    assert_eq!(saved.subject, "Meeting Reminder");
    assert_eq!(
        saved.content,
        "Hi Saad, A reminder of our meeting tomorrow at 10 am. Best regards"
    );

    let solve_prompt = &generator.prompts()[1];
    assert!(
        solve_prompt.contains("Email data saved successfully for saad@gmail.com = emailSender["),
        "{solve_prompt}"
    );
}

/// A failing tool is recorded as the step result and the run still finishes.
#[test]
fn tool_failure_is_recorded_and_run_reaches_done() {
    let planner = ScriptedPlanner::new(plan_text(&[
        step("#E1", StepKind::EmailSender, "not an email"),
    ]));
    let generator = ScriptedGenerator::new(["could not save the email"]);
    let tool = RecordingTool::failing(ToolError::Format(
        "Error: Invalid JSON format in email data".to_string(),
    ));
    let workflow = PlanSolveWorkflow::new(&planner, &generator, &tool, CALL_TIMEOUT);

    let run = workflow
        .solve(Task::new("email someone"), Duration::from_secs(60))
        .expect("solve");

    assert_eq!(
        run.results().get("#E1"),
        Some("Error: Invalid JSON format in email data")
    );
    assert_eq!(run.phase(), RunPhase::Done);
    assert_eq!(run.final_result(), Some("could not save the email"));

    let payload: serde_json::Value =
        serde_json::from_str(&tool.payloads()[0]).expect("payload json");
    assert_eq!(payload["receiver"], "");
}

/// Planner text without usable steps goes straight to the solve call.
#[test]
fn plan_without_steps_goes_straight_to_solve() {
    let planner = ScriptedPlanner::new("I would rather just answer directly.");
    let generator = ScriptedGenerator::new(["42"]);
    let tool = RecordingTool::succeeding();
    let workflow = PlanSolveWorkflow::new(&planner, &generator, &tool, CALL_TIMEOUT);

    let mut run = workflow
        .plan(Task::new("what is six times seven"), deadline())
        .expect("plan");
    assert!(run.plan().is_empty());
    assert_eq!(run.phase(), RunPhase::Solving);
    assert_eq!(run.dropped()[0].reason, DropReason::Unmatched);

    let outcome = workflow.run(&mut run, deadline(), |_| {}).expect("run");

    assert_eq!(outcome.steps_executed, 1);
    assert_eq!(generator.calls(), 1);
    assert_eq!(run.final_result(), Some("42"));
}

/// A generation failure mid-plan aborts the run and names the step.
#[test]
fn generation_failure_aborts_with_step_stage() {
    let planner = ScriptedPlanner::new(plan_text(&[
        step("#E1", StepKind::Llm, "first"),
        step("#E2", StepKind::Llm, "second"),
        step("#E3", StepKind::Llm, "third"),
    ]));
    let generator = ScriptedGenerator::from_results(vec![
        Ok("one".to_string()),
        Err(GenerationError::Failed("rate limited".to_string())),
    ]);
    let tool = RecordingTool::succeeding();
    let workflow = PlanSolveWorkflow::new(&planner, &generator, &tool, CALL_TIMEOUT);

    let mut run = workflow.plan(Task::new("t"), deadline()).expect("plan");
    let err = workflow
        .run(&mut run, deadline(), |_| {})
        .expect_err("abort");

    assert!(
        matches!(&err, EngineError::Generation { stage, .. } if stage == "step #E2"),
        "{err}"
    );
    assert_eq!(run.results().len(), 1);
    assert_eq!(run.final_result(), None);
    assert_eq!(generator.calls(), 2);
}

/// An exhausted run budget fails before the planner is called.
#[test]
fn exhausted_budget_times_out_before_planning() {
    let planner = ScriptedPlanner::new("Plan: a #E1 = LLM[x]");
    let generator = ScriptedGenerator::new(["unused"]);
    let tool = RecordingTool::succeeding();
    let workflow = PlanSolveWorkflow::new(&planner, &generator, &tool, CALL_TIMEOUT);

    let err = workflow
        .solve(Task::new("t"), Duration::ZERO)
        .expect_err("timeout");

    assert!(err.is_timeout(), "{err}");
    assert_eq!(err.to_string(), "plan timed out");
    assert_eq!(planner.calls(), 0);
}

/// Planner failures abort with a planning error.
#[test]
fn planner_failure_aborts_run() {
    let planner = ScriptedPlanner::failing(GenerationError::Empty);
    let generator = ScriptedGenerator::new(["unused"]);
    let tool = RecordingTool::succeeding();
    let workflow = PlanSolveWorkflow::new(&planner, &generator, &tool, CALL_TIMEOUT);

    let err = workflow
        .solve(Task::new("t"), Duration::from_secs(60))
        .expect_err("planning");

    assert!(matches!(err, EngineError::Planning { .. }), "{err}");
    assert_eq!(generator.calls(), 0);
}
