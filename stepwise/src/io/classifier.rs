//! Content classifiers backing the moderation checks.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::{debug, instrument};

use crate::core::types::CheckOutcome;
use crate::error::ClassifierError;

static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?\n]+[.!?]*").expect("valid sentence regex"));

/// What a check looks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckPolicy {
    /// Validated sentence by sentence.
    Toxicity { terms: Vec<String> },
    /// Topic name -> indicative terms.
    SensitiveTopic {
        topics: BTreeMap<String, Vec<String>>,
    },
}

/// Decides whether text violates a policy.
pub trait ContentClassifier {
    fn check(&self, text: &str, policy: &CheckPolicy) -> Result<CheckOutcome, ClassifierError>;
}

impl<C: ContentClassifier + ?Sized> ContentClassifier for &C {
    fn check(&self, text: &str, policy: &CheckPolicy) -> Result<CheckOutcome, ClassifierError> {
        (**self).check(text, policy)
    }
}

/// Case-insensitive whole-word term matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconClassifier;

impl ContentClassifier for LexiconClassifier {
    #[instrument(skip_all, fields(text_bytes = text.len()))]
    fn check(&self, text: &str, policy: &CheckPolicy) -> Result<CheckOutcome, ClassifierError> {
        match policy {
            CheckPolicy::Toxicity { terms } => check_toxicity(text, terms),
            CheckPolicy::SensitiveTopic { topics } => check_topics(text, topics),
        }
    }
}

fn check_toxicity(text: &str, terms: &[String]) -> Result<CheckOutcome, ClassifierError> {
    let Some(matcher) = term_matcher(terms)? else {
        return Ok(pass());
    };
    let toxic: Vec<&str> = sentences(text)
        .filter(|sentence| matcher.is_match(sentence))
        .collect();
    debug!(toxic_sentences = toxic.len(), "toxicity checked");
    if toxic.is_empty() {
        return Ok(pass());
    }
    let listed = toxic
        .iter()
        .map(|sentence| format!("- {sentence}"))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(CheckOutcome::Fail {
        reason: format!(
            "The following sentences in your response were found to be toxic:\n\n{listed}"
        ),
    })
}

fn check_topics(
    text: &str,
    topics: &BTreeMap<String, Vec<String>>,
) -> Result<CheckOutcome, ClassifierError> {
    let mut found = Vec::new();
    for (topic, terms) in topics {
        if let Some(matcher) = term_matcher(terms)?
            && matcher.is_match(text)
        {
            found.push(topic.as_str());
        }
    }
    debug!(topics = ?found, "sensitive topics checked");
    if found.is_empty() {
        return Ok(pass());
    }
    Ok(CheckOutcome::Fail {
        reason: format!("Invalid topics found: {}", found.join(", ")),
    })
}

fn pass() -> CheckOutcome {
    CheckOutcome::Pass {
        message: "no violations found".to_string(),
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Alternation of the non-blank `terms`; word boundaries are only applied
/// where a term starts or ends with a word character.
fn term_matcher(terms: &[String]) -> Result<Option<Regex>, ClassifierError> {
    let alternatives: Vec<String> = terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty())
        .map(|term| {
            let escaped = regex::escape(term);
            let start = if starts_with_word_char(term) { r"\b" } else { "" };
            let end = if ends_with_word_char(term) { r"\b" } else { "" };
            format!("{start}{escaped}{end}")
        })
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&format!("(?:{})", alternatives.join("|")))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|err| ClassifierError::Failed(format!("invalid term list: {err}")))
}

fn starts_with_word_char(term: &str) -> bool {
    term.chars().next().is_some_and(is_word_char)
}

fn ends_with_word_char(term: &str) -> bool {
    term.chars().next_back().is_some_and(is_word_char)
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
