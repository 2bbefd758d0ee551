//! Runs moderation checks and drafts the reply for passing input.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::core::budget::remaining_budget;
use crate::core::types::{CheckKind, CheckOutcome};
use crate::error::EngineError;
use crate::io::classifier::{CheckPolicy, ContentClassifier};
use crate::io::generator::{Generator, complete_within};

/// Registered checks with their policies.
///
/// Every failure inside a check (classifier error, reply generation error,
/// exhausted budget) is reported as [`CheckOutcome::Fail`].
pub struct CheckRunner<C, G> {
    classifier: C,
    generator: G,
    policies: BTreeMap<CheckKind, CheckPolicy>,
    call_timeout: Duration,
}

impl<C: ContentClassifier, G: Generator> CheckRunner<C, G> {
    pub fn new(
        classifier: C,
        generator: G,
        policies: BTreeMap<CheckKind, CheckPolicy>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            generator,
            policies,
            call_timeout,
        }
    }

    pub fn is_registered(&self, kind: CheckKind) -> bool {
        self.policies.contains_key(&kind)
    }

    /// Check `text` and, when it passes, answer it.
    ///
    /// Errors only when `kind` has no registered policy.
    #[instrument(skip_all, fields(check = %kind))]
    pub fn run(
        &self,
        kind: CheckKind,
        text: &str,
        deadline: Instant,
    ) -> Result<CheckOutcome, EngineError> {
        let policy = self
            .policies
            .get(&kind)
            .ok_or_else(|| EngineError::Routing(format!("{kind} is not a registered check")))?;

        if remaining_budget(deadline).is_none() {
            warn!("no budget left for check");
            return Ok(fail(format!("{} check timed out", kind.label())));
        }

        match self.classifier.check(text, policy) {
            Ok(CheckOutcome::Pass { .. }) => {}
            Ok(failed @ CheckOutcome::Fail { .. }) => {
                info!("check failed");
                return Ok(failed);
            }
            Err(err) => {
                warn!(err = %err, "classifier error");
                return Ok(fail(err.to_string()));
            }
        }

        let prompt = text.to_string();
        match complete_within(&self.generator, prompt, deadline, self.call_timeout) {
            Ok(reply) => {
                info!("check passed");
                Ok(CheckOutcome::Pass {
                    message: format!("{} check passed. Response: {reply}", kind.label()),
                })
            }
            Err(err) => {
                warn!(err = %err, "reply generation failed");
                Ok(fail(err.to_string()))
            }
        }
    }
}

fn fail(reason: String) -> CheckOutcome {
    CheckOutcome::Fail { reason }
}
