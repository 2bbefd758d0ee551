//! Normalization of drafted email text into subject and body.

use serde::{Deserialize, Serialize};

/// Email fields persisted by the email action tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub receiver: String,
    pub subject: String,
    pub content: String,
}

/// Split drafted text into `(subject, content)`.
///
/// The subject is taken from the first `Subject:` line, which is removed from
/// the body. Remaining whitespace (including newlines) collapses to single
/// spaces. Missing subject yields an empty string.
pub fn split_subject(draft: &str) -> (String, String) {
    let mut subject = None;
    let mut body = Vec::new();
    for line in draft.lines() {
        let trimmed = line.trim_start();
        if subject.is_none()
            && let Some(rest) = trimmed.strip_prefix("Subject:")
        {
            subject = Some(rest.trim().to_string());
            continue;
        }
        body.push(line);
    }
    let content = body
        .iter()
        .flat_map(|line| line.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    (subject.unwrap_or_default(), content)
}
