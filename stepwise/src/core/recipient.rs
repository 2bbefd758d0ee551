//! Recipient extraction for the email action tool.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

/// First well-formed email address in `task`, or an empty string.
///
/// The recipient comes from the task text rather than from step output; an
/// empty recipient is a defined condition and the step still runs.
pub fn extract_recipient(task: &str) -> String {
    EMAIL_RE
        .find(task)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
