//! Line-oriented parser turning planner text into ordered steps.
//!
//! Grammar: a rationale line `Plan: <text>` followed, on the same line or the
//! next non-blank line, by `<result_name> = <kind>[<input>]`. List markers and
//! emphasis around either part (`1. Plan:`, `**Plan:**`, `- #E1 = ...`) are
//! ignored. Anything else is dropped and reported in [`ParsedPlan::dropped`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::types::{Plan, Step, StepKind};
use crate::error::ParseError;

static RATIONALE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bPlan:[*_]*\s*(.*)$").expect("valid rationale regex"));

static BINDING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(#E\d+)\s*=\s*(\w+)\s*\[([^\]]+)\]").expect("valid binding regex")
});

/// Why a line did not contribute a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DropReason {
    /// Line matches neither a rationale nor a binding.
    Unmatched,
    /// Rationale not followed by a binding.
    OrphanRationale,
    /// Binding without a preceding rationale.
    MissingRationale,
    /// Binding names a kind outside the registry.
    UnknownKind(String),
}

/// A non-fatal parse warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedLine {
    /// 1-based line number in the planner text.
    pub line: usize,
    pub text: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPlan {
    pub plan: Plan,
    pub dropped: Vec<DroppedLine>,
}

impl ParsedPlan {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }
}

struct PendingRationale {
    line: usize,
    text: String,
    description: String,
}

/// Parse planner output into a [`Plan`].
///
/// Steps keep their order of occurrence. Fails only when a `result_name` is
/// bound twice.
pub fn parse_plan(raw: &str) -> Result<ParsedPlan, ParseError> {
    let mut steps: Vec<Step> = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut dropped = Vec::new();
    let mut pending: Option<PendingRationale> = None;

    for (idx, text) in raw.lines().enumerate() {
        let line = idx + 1;
        if text.trim().is_empty() {
            continue;
        }

        if let Some(caps) = RATIONALE_RE.captures(text) {
            if let Some(orphan) = pending.take() {
                dropped.push(orphan_line(orphan));
            }
            let rest = caps.get(1).map_or("", |m| m.as_str());
            match BINDING_RE.captures_iter(rest).last() {
                Some(binding) => {
                    let start = binding.get(0).map_or(rest.len(), |m| m.start());
                    let description = rest[..start].trim().to_string();
                    push_binding(
                        &binding,
                        description,
                        line,
                        text,
                        &mut steps,
                        &mut first_seen,
                        &mut dropped,
                    )?;
                }
                None => {
                    pending = Some(PendingRationale {
                        line,
                        text: text.to_string(),
                        description: rest.trim().to_string(),
                    });
                }
            }
            continue;
        }

        match (BINDING_RE.captures_iter(text).last(), pending.take()) {
            (Some(binding), Some(rationale)) => {
                push_binding(
                    &binding,
                    rationale.description,
                    line,
                    text,
                    &mut steps,
                    &mut first_seen,
                    &mut dropped,
                )?;
            }
            (Some(_), None) => dropped.push(dropped_line(line, text, DropReason::MissingRationale)),
            (None, orphan) => {
                if let Some(orphan) = orphan {
                    dropped.push(orphan_line(orphan));
                }
                dropped.push(dropped_line(line, text, DropReason::Unmatched));
            }
        }
    }

    if let Some(orphan) = pending.take() {
        dropped.push(orphan_line(orphan));
    }
    dropped.sort_by_key(|d| d.line);

    for d in &dropped {
        warn!(line = d.line, reason = ?d.reason, "dropped plan line");
    }
    debug!(steps = steps.len(), dropped = dropped.len(), "parsed plan");

    Ok(ParsedPlan {
        plan: Plan::new(steps, raw),
        dropped,
    })
}

fn push_binding(
    binding: &regex::Captures<'_>,
    description: String,
    line: usize,
    text: &str,
    steps: &mut Vec<Step>,
    first_seen: &mut HashMap<String, usize>,
    dropped: &mut Vec<DroppedLine>,
) -> Result<(), ParseError> {
    let capture = |i: usize| binding.get(i).map_or("", |m| m.as_str());
    let result_name = capture(1).to_string();
    let kind_name = capture(2);

    let Some(kind) = StepKind::from_name(kind_name) else {
        dropped.push(dropped_line(
            line,
            text,
            DropReason::UnknownKind(kind_name.to_string()),
        ));
        return Ok(());
    };

    if let Some(first_line) = first_seen.get(&result_name) {
        return Err(ParseError::DuplicateResultName {
            name: result_name,
            line,
            first_line: *first_line,
        });
    }
    first_seen.insert(result_name.clone(), line);

    steps.push(Step {
        description,
        result_name,
        kind,
        input: capture(3).to_string(),
    });
    Ok(())
}

fn orphan_line(pending: PendingRationale) -> DroppedLine {
    dropped_line(pending.line, &pending.text, DropReason::OrphanRationale)
}

fn dropped_line(line: usize, text: &str, reason: DropReason) -> DroppedLine {
    DroppedLine {
        line,
        text: text.to_string(),
        reason,
    }
}
