//! Engine configuration stored in `stepwise.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::CheckKind;
use crate::io::atomic::write_atomic;
use crate::io::classifier::CheckPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "stepwise.toml";

/// Engine configuration (TOML).
///
/// Meant to be edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StepwiseConfig {
    /// Wall-clock budget for a whole run in seconds (every collaborator call).
    pub run_timeout_secs: u64,

    /// Maximum routing decisions per moderation run.
    pub max_route_steps: u32,

    pub llm: LlmConfig,
    pub email: EmailConfig,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    /// Command that reads a prompt on stdin and prints the completion
    /// (e.g. `["llm", "-m", "gpt-4o-mini"]`).
    pub command: Vec<String>,

    /// Upper bound for a single completion call in seconds.
    pub call_timeout_secs: u64,

    /// Discard completion output beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmailConfig {
    /// Where the email tool writes the drafted message.
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouterKind {
    /// Run `checks` in order, then finish.
    Fixed,
    /// Ask the generator which check runs next.
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModerationConfig {
    pub router: RouterKind,

    /// Registered checks, in the order the fixed router runs them.
    pub checks: Vec<CheckKind>,

    /// Terms that mark a sentence as toxic.
    pub toxic_terms: Vec<String>,

    /// Topic name -> terms that indicate the topic.
    pub sensitive_topics: BTreeMap<String, Vec<String>>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string()],
            call_timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("email_data.json"),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            router: RouterKind::Fixed,
            checks: CheckKind::ALL.to_vec(),
            toxic_terms: to_strings(&[
                "idiot", "stupid", "dumb", "moron", "loser", "pathetic", "worthless", "useless",
                "hate you", "shut up", "kill you", "trash",
            ]),
            sensitive_topics: BTreeMap::from([
                (
                    "politics".to_string(),
                    to_strings(&[
                        "politics", "political", "election", "government", "president",
                        "parliament", "democrat", "republican", "middle east",
                    ]),
                ),
                (
                    "religion".to_string(),
                    to_strings(&[
                        "religion", "religious", "god", "church", "mosque", "temple", "bible",
                        "quran", "faith",
                    ]),
                ),
                (
                    "race".to_string(),
                    to_strings(&["race", "racial", "racist", "ethnicity", "ethnic"]),
                ),
                (
                    "violence".to_string(),
                    to_strings(&[
                        "violence", "violent", "kill", "murder", "weapon", "attack", "assault",
                    ]),
                ),
            ]),
        }
    }
}

impl Default for StepwiseConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 10 * 60,
            max_route_steps: 8,
            llm: LlmConfig::default(),
            email: EmailConfig::default(),
            moderation: ModerationConfig::default(),
        }
    }
}

impl StepwiseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.run_timeout_secs == 0 {
            return Err(anyhow!("run_timeout_secs must be > 0"));
        }
        if self.max_route_steps == 0 {
            return Err(anyhow!("max_route_steps must be > 0"));
        }
        if self.llm.command.is_empty() || self.llm.command[0].trim().is_empty() {
            return Err(anyhow!("llm.command must be a non-empty array"));
        }
        if self.llm.call_timeout_secs == 0 {
            return Err(anyhow!("llm.call_timeout_secs must be > 0"));
        }
        if self.llm.output_limit_bytes == 0 {
            return Err(anyhow!("llm.output_limit_bytes must be > 0"));
        }
        if self.email.output_path.as_os_str().is_empty() {
            return Err(anyhow!("email.output_path must not be empty"));
        }
        self.moderation.validate()
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.call_timeout_secs)
    }
}

impl ModerationConfig {
    fn validate(&self) -> Result<()> {
        if self.checks.is_empty() {
            return Err(anyhow!("moderation.checks must list at least one check"));
        }
        for (idx, kind) in self.checks.iter().enumerate() {
            if self.checks[..idx].contains(kind) {
                return Err(anyhow!("moderation.checks lists {kind} twice"));
            }
        }
        if self.checks.contains(&CheckKind::Toxicity)
            && self.toxic_terms.iter().all(|t| t.trim().is_empty())
        {
            return Err(anyhow!("moderation.toxic_terms must not be empty"));
        }
        if self.checks.contains(&CheckKind::SensitiveTopic) && self.sensitive_topics.is_empty() {
            return Err(anyhow!("moderation.sensitive_topics must not be empty"));
        }
        Ok(())
    }

    /// Classifier policy for a registered check.
    pub fn policy_for(&self, kind: CheckKind) -> CheckPolicy {
        match kind {
            CheckKind::Toxicity => CheckPolicy::Toxicity {
                terms: self.toxic_terms.clone(),
            },
            CheckKind::SensitiveTopic => CheckPolicy::SensitiveTopic {
                topics: self.sensitive_topics.clone(),
            },
        }
    }

    /// Policies for every registered check.
    pub fn policies(&self) -> BTreeMap<CheckKind, CheckPolicy> {
        self.checks
            .iter()
            .map(|&kind| (kind, self.policy_for(kind)))
            .collect()
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `StepwiseConfig::default()`.
pub fn load_config(path: &Path) -> Result<StepwiseConfig> {
    if !path.exists() {
        let cfg = StepwiseConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: StepwiseConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &StepwiseConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
