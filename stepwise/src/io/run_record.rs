//! Run records written with `--record`.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::io::atomic::write_json_atomic;

/// Envelope persisted for one finished (or failed) run.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord<'a, T: Serialize> {
    /// `plan_solve` or `moderation`.
    pub workflow: &'static str,
    pub steps_executed: u32,
    pub duration_ms: u64,
    /// Run-level error, when the run aborted.
    pub error: Option<String>,
    pub run: &'a T,
}

/// Atomically write a run record as pretty JSON (temp file + rename).
pub fn write_run_record<T: Serialize>(path: &Path, record: &RunRecord<'_, T>) -> Result<()> {
    debug!(
        path = %path.display(),
        workflow = record.workflow,
        steps = record.steps_executed,
        "writing run record"
    );
    write_json_atomic(path, record)
}
