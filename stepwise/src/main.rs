//! `stepwise` command-line interface.
//!
//! Runs the plan-and-solve and moderation workflows against the collaborators
//! configured in `stepwise.toml`, and offers offline helpers for inspecting
//! plans and bootstrapping a config file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use stepwise::agents::checks::CheckRunner;
use stepwise::agents::plan_solve::PlanSolveWorkflow;
use stepwise::agents::planner::LlmPlanner;
use stepwise::agents::supervisor::{
    FixedSequenceRouter, LlmRouter, ModerationRun, ModerationWorkflow, Router,
};
use stepwise::core::plan_parser::parse_plan;
use stepwise::core::types::Task;
use stepwise::error::EngineError;
use stepwise::exit_codes;
use stepwise::io::classifier::{ContentClassifier, LexiconClassifier};
use stepwise::io::config::{
    DEFAULT_CONFIG_PATH, RouterKind, StepwiseConfig, load_config, write_config,
};
use stepwise::io::email_tool::EmailFileTool;
use stepwise::io::generator::{CommandGenerator, Generator};
use stepwise::io::run_record::{RunRecord, write_run_record};
use stepwise::logging;

#[derive(Parser)]
#[command(
    name = "stepwise",
    version,
    about = "Step-sequenced task executor: plan-and-solve and moderation"
)]
struct Cli {
    /// Config file; a missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write the run record (JSON) to this path.
    #[arg(long, global = true)]
    record: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a task, execute each step and print the consolidated answer.
    Solve { task: String },
    /// Route text through the moderation checks and print the verdict.
    Moderate { text: String },
    /// Parse a plan file and print its steps (no collaborators are called).
    ParsePlan { file: PathBuf },
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Solve { task } => {
            let cfg = load_config(&cli.config)?;
            cmd_solve(&cfg, task, cli.record.as_deref())
        }
        Command::Moderate { text } => {
            let cfg = load_config(&cli.config)?;
            cmd_moderate(&cfg, text, cli.record.as_deref())
        }
        Command::ParsePlan { file } => cmd_parse_plan(&file),
        Command::Init { force } => cmd_init(&cli.config, force),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::NoProgress(_)) => exit_codes::NO_PROGRESS,
        _ => exit_codes::INVALID,
    }
}

/// Step counters collected through `on_step`, so a record can be written even
/// when the loop aborts.
#[derive(Default)]
struct StepTally {
    steps: u32,
    duration_ms: u64,
}

fn cmd_solve(cfg: &StepwiseConfig, task: String, record: Option<&Path>) -> Result<i32> {
    let generator = CommandGenerator::new(cfg.llm.command.clone(), cfg.llm.output_limit_bytes);
    let workflow = PlanSolveWorkflow::new(
        LlmPlanner::new(&generator),
        &generator,
        EmailFileTool::new(&cfg.email.output_path),
        cfg.call_timeout(),
    );

    let deadline = Instant::now() + cfg.run_timeout();
    let mut run = workflow.plan(Task::new(task), deadline)?;
    let mut tally = StepTally::default();
    let result = workflow.run(&mut run, deadline, |step| {
        tally.steps += 1;
        tally.duration_ms += step.duration_ms;
        info!(iter = step.iter, action = ?step.action, "step finished");
    });

    if let Some(path) = record {
        write_run_record(
            path,
            &RunRecord {
                workflow: "plan_solve",
                steps_executed: tally.steps,
                duration_ms: tally.duration_ms,
                error: result.as_ref().err().map(describe),
                run: &run,
            },
        )?;
    }
    result?;

    println!("{}", run.final_result().unwrap_or_default());
    Ok(exit_codes::OK)
}

fn cmd_moderate(cfg: &StepwiseConfig, text: String, record: Option<&Path>) -> Result<i32> {
    let generator = CommandGenerator::new(cfg.llm.command.clone(), cfg.llm.output_limit_bytes);
    let checks = CheckRunner::new(
        LexiconClassifier,
        &generator,
        cfg.moderation.policies(),
        cfg.call_timeout(),
    );
    let order = cfg.moderation.checks.clone();
    match cfg.moderation.router {
        RouterKind::Fixed => {
            moderate_with(FixedSequenceRouter::new(order), checks, cfg, text, record)
        }
        RouterKind::Llm => {
            let router = LlmRouter::new(&generator, order);
            moderate_with(router, checks, cfg, text, record)
        }
    }
}

fn moderate_with<R: Router, C: ContentClassifier, G: Generator>(
    router: R,
    checks: CheckRunner<C, G>,
    cfg: &StepwiseConfig,
    text: String,
    record: Option<&Path>,
) -> Result<i32> {
    let workflow = ModerationWorkflow::new(router, checks, cfg.call_timeout(), cfg.max_route_steps);
    let mut run = ModerationRun::new(text);
    let mut tally = StepTally::default();
    let result = workflow.run(&mut run, Instant::now() + cfg.run_timeout(), |step| {
        tally.steps += 1;
        tally.duration_ms += step.duration_ms;
        info!(iter = step.iter, action = ?step.action, "step finished");
    });

    if let Some(path) = record {
        write_run_record(
            path,
            &RunRecord {
                workflow: "moderation",
                steps_executed: tally.steps,
                duration_ms: tally.duration_ms,
                error: result.as_ref().err().map(describe),
                run: &run,
            },
        )?;
    }
    result?;

    println!("{}", run.final_result().unwrap_or_default());
    if run.is_rejected() {
        return Ok(exit_codes::REJECTED);
    }
    Ok(exit_codes::OK)
}

fn cmd_parse_plan(file: &Path) -> Result<i32> {
    let raw = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let parsed = parse_plan(&raw).with_context(|| format!("parse {}", file.display()))?;
    for step in parsed.plan.steps() {
        println!("{} = {}[{}]", step.result_name, step.kind, step.input);
        println!("  Plan: {}", step.description);
    }
    for dropped in &parsed.dropped {
        eprintln!("dropped line {}: {:?}", dropped.line, dropped.reason);
    }
    println!(
        "steps: {}, dropped: {}",
        parsed.plan.len(),
        parsed.dropped_count()
    );
    Ok(exit_codes::OK)
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    write_config(path, &StepwiseConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

/// Error with its source chain, `outer: inner: ...`.
fn describe(err: &EngineError) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
