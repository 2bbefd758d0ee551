//! CLI tests for the `stepwise` binary.
//!
//! Spawns the binary in a temp directory and verifies output and exit codes.
//! Workflow commands use a small `sh` script as the completion command.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use stepwise::exit_codes;
use stepwise::io::config::{StepwiseConfig, write_config};

fn stepwise(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stepwise"))
        .current_dir(dir)
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("run stepwise")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Write `stepwise.toml` in `dir` using `script` as the completion command.
#[cfg(unix)]
fn write_script_config(dir: &Path, script: &str) {
    let mut cfg = StepwiseConfig::default();
    cfg.llm.command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
    cfg.llm.call_timeout_secs = 10;
    cfg.email.output_path = dir.join("email_data.json");
    write_config(&dir.join("stepwise.toml"), &cfg).expect("write config");
}

#[test]
fn parse_plan_prints_steps_and_counts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan = "Here you go:\nPlan: Draft the email.\n#E1 = LLM[draft it]\n\
                Plan: Save it.\n#E2 = emailSender[#E1]\n";
    fs::write(temp.path().join("plan.txt"), plan).expect("write plan");

    let output = stepwise(temp.path(), &["parse-plan", "plan.txt"]);

    let expected = "#E1 = LLM[draft it]\n  Plan: Draft the email.\n\
                    #E2 = emailSender[#E1]\n  Plan: Save it.\nsteps: 2, dropped: 1\n";
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), expected);
    assert!(
        stderr(&output).contains("dropped line 1"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn parse_plan_rejects_duplicate_result_names() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("plan.txt"),
        "Plan: a\n#E1 = LLM[x]\nPlan: b\n#E1 = LLM[y]\n",
    )
    .expect("write plan");

    let output = stepwise(temp.path(), &["parse-plan", "plan.txt"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(
        stderr(&output).contains("duplicate result name '#E1'"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = stepwise(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(temp.path().join("stepwise.toml")).expect("read config");
    assert!(written.contains("run_timeout_secs"));

    let output = stepwise(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(stderr(&output).contains("already exists"));

    let output = stepwise(temp.path(), &["init", "--force"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn invalid_config_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("stepwise.toml"), "run_timeout_secs = 0\n").expect("write");

    let output = stepwise(temp.path(), &["moderate", "hello"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(
        stderr(&output).contains("run_timeout_secs"),
        "{}",
        stderr(&output)
    );
}

/// Verifies a full solve: plan, draft, save the email, consolidate, record.
#[cfg(unix)]
#[test]
fn solve_runs_plan_and_writes_email_and_record() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_script_config(
        temp.path(),
        r#"p=$(cat)
case "$p" in
  *"make plans"*)
    printf 'Plan: Draft a note.\n#E1 = LLM[write a note]\n'
    printf 'Plan: Save it.\n#E2 = emailSender[#E1]\n' ;;
  *"Now solve"*) echo "note saved" ;;
  *) printf 'Subject: Hello\n\nHi Bob,\nsee you soon.\n' ;;
esac"#,
    );

    let output = stepwise(
        temp.path(),
        &["solve", "email bob@x.io a note", "--record", "run.json"],
    );

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "{}",
        stderr(&output)
    );
    assert_eq!(stdout(&output), "note saved\n");

    let email = fs::read_to_string(temp.path().join("email_data.json")).expect("read email");
    let email: serde_json::Value = serde_json::from_str(&email).expect("email json");
    assert_eq!(email["receiver"], "bob@x.io");
    assert_eq!(email["subject"], "Hello");
    assert_eq!(email["content"], "Hi Bob, see you soon.");

    let record = fs::read_to_string(temp.path().join("run.json")).expect("read record");
    let record: serde_json::Value = serde_json::from_str(&record).expect("record json");
    assert_eq!(record["workflow"], "plan_solve");
    assert_eq!(record["steps_executed"], 3);
    assert_eq!(record["error"], serde_json::Value::Null);
    assert_eq!(record["run"]["final_result"], "note saved");
}

/// Verifies a failing completion command aborts the solve with exit 1.
#[cfg(unix)]
#[test]
fn solve_reports_planning_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_script_config(temp.path(), "cat >/dev/null; echo offline >&2; exit 1");

    let output = stepwise(temp.path(), &["solve", "anything"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let err = stderr(&output);
    assert!(err.contains("planning failed"), "{err}");
    assert!(err.contains("offline"), "{err}");
}

#[cfg(unix)]
#[test]
fn moderate_rejects_toxic_text() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_script_config(temp.path(), "cat >/dev/null; echo 'Hello back'");

    let output = stepwise(temp.path(), &["moderate", "Shut up, you idiot."]);

    assert_eq!(output.status.code(), Some(exit_codes::REJECTED));
    assert!(
        stdout(&output).contains("found to be toxic"),
        "{}",
        stdout(&output)
    );
}

#[cfg(unix)]
#[test]
fn moderate_passes_clean_text() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_script_config(temp.path(), "cat >/dev/null; echo 'Hello back'");

    let output = stepwise(temp.path(), &["moderate", "Good morning!"]);

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "{}",
        stderr(&output)
    );
    assert_eq!(
        stdout(&output),
        "Sensitive topic check passed. Response: Hello back\n"
    );
}
