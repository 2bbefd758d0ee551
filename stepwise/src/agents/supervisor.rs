//! Moderation supervisor: routes a conversation through checks until one
//! fails or the router decides to finish.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::agents::checks::CheckRunner;
use crate::core::budget::call_timeout;
use crate::core::types::{CheckKind, CheckOutcome, Message, RouteDecision, RunPhase};
use crate::error::EngineError;
use crate::io::classifier::ContentClassifier;
use crate::io::generator::{CompletionRequest, Generator};
use crate::io::prompt::PromptEngine;
use crate::looping::{LoopOutcome, run_loop};
use crate::step::{StepOutcome, Workflow};

/// A check that ran, with its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckRecord {
    pub kind: CheckKind,
    pub outcome: CheckOutcome,
}

/// State of one moderation run. Owned by that run only.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationRun {
    messages: Vec<Message>,
    checks_run: Vec<CheckRecord>,
    error: Option<String>,
    final_result: Option<String>,
}

impl ModerationRun {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(input)],
            checks_run: Vec::new(),
            error: None,
            final_result: None,
        }
    }

    /// The user text every check validates.
    pub fn input(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.is_user())
            .map_or("", |m| m.content.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn checks_run(&self) -> &[CheckRecord] {
        &self.checks_run
    }

    pub fn has_run(&self, kind: CheckKind) -> bool {
        self.checks_run.iter().any(|record| record.kind == kind)
    }

    /// Reason of the failing check (or aborted routing), if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_rejected(&self) -> bool {
        self.error.is_some()
    }

    pub fn final_result(&self) -> Option<&str> {
        self.final_result.as_deref()
    }

    pub fn phase(&self) -> RunPhase {
        if self.final_result.is_some() {
            RunPhase::Done
        } else {
            RunPhase::Running
        }
    }

    fn record_check(&mut self, kind: CheckKind, outcome: CheckOutcome) -> Result<(), EngineError> {
        self.ensure_open()?;
        let content = match &outcome {
            CheckOutcome::Pass { message } => message.clone(),
            CheckOutcome::Fail { reason } => {
                self.error = Some(reason.clone());
                format!("Error: {reason}")
            }
        };
        self.messages.push(Message::from_check(kind, content));
        self.checks_run.push(CheckRecord { kind, outcome });
        Ok(())
    }

    fn abort(&mut self, reason: String) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.error = Some(reason.clone());
        self.final_result = Some(reason);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = match &self.error {
            Some(reason) => reason.clone(),
            None => self
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
        };
        self.final_result = Some(result);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.final_result.is_some() {
            return Err(EngineError::Invariant(
                "moderation run already holds a final result".to_string(),
            ));
        }
        Ok(())
    }
}

/// Picks the next check, or `FINISH`.
pub trait Router {
    fn route(&self, run: &ModerationRun, timeout: Duration) -> Result<RouteDecision, EngineError>;
}

impl<R: Router + ?Sized> Router for &R {
    fn route(&self, run: &ModerationRun, timeout: Duration) -> Result<RouteDecision, EngineError> {
        (**self).route(run, timeout)
    }
}

/// Runs the configured checks in order, each once, then finishes.
#[derive(Debug, Clone)]
pub struct FixedSequenceRouter {
    order: Vec<CheckKind>,
}

impl FixedSequenceRouter {
    pub fn new(order: Vec<CheckKind>) -> Self {
        Self { order }
    }
}

impl Router for FixedSequenceRouter {
    fn route(&self, run: &ModerationRun, _timeout: Duration) -> Result<RouteDecision, EngineError> {
        Ok(self
            .order
            .iter()
            .copied()
            .find(|&kind| !run.has_run(kind))
            .map_or(RouteDecision::Finish, RouteDecision::Check))
    }
}

/// Asks a [`Generator`] which registered check acts next.
pub struct LlmRouter<G> {
    generator: G,
    members: Vec<CheckKind>,
    prompts: PromptEngine,
}

impl<G: Generator> LlmRouter<G> {
    pub fn new(generator: G, members: Vec<CheckKind>) -> Self {
        Self {
            generator,
            members,
            prompts: PromptEngine::new(),
        }
    }
}

impl<G: Generator> Router for LlmRouter<G> {
    #[instrument(skip_all, fields(messages = run.messages().len()))]
    fn route(&self, run: &ModerationRun, timeout: Duration) -> Result<RouteDecision, EngineError> {
        let prompt = self
            .prompts
            .render_supervisor(&self.members, run.messages())?;
        let reply = self
            .generator
            .complete(&CompletionRequest::new(prompt, timeout))
            .map_err(|err| EngineError::generation("route", err))?;
        parse_route_reply(&reply, &self.members).ok_or_else(|| {
            EngineError::Routing(format!("unrecognized routing reply: {}", reply.trim()))
        })
    }
}

/// Read a routing decision from free-form model output.
///
/// Accepts a reply naming exactly one option (`FINISH` or a member name,
/// case-insensitive), bare or embedded, e.g. `{"next": "ToxicityChecker"}`.
pub fn parse_route_reply(reply: &str, members: &[CheckKind]) -> Option<RouteDecision> {
    let options = std::iter::once(RouteDecision::Finish)
        .chain(members.iter().copied().map(RouteDecision::Check));
    let mut found = None;
    for option in options {
        let mentioned = reply
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word.eq_ignore_ascii_case(option.as_str()));
        if mentioned {
            if found.is_some() {
                return None;
            }
            found = Some(option);
        }
    }
    found
}

/// What the supervisor does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Check(CheckKind),
    /// Router chose `FINISH`.
    Finish,
    /// A check failed; terminate with its reason.
    Reject,
    /// Routing could not run in time.
    Abort,
}

/// Moderation pipeline over injected collaborators.
pub struct ModerationWorkflow<R, C, G> {
    router: R,
    checks: CheckRunner<C, G>,
    call_timeout: Duration,
    max_route_steps: u32,
}

impl<R: Router, C: ContentClassifier, G: Generator> ModerationWorkflow<R, C, G> {
    pub fn new(
        router: R,
        checks: CheckRunner<C, G>,
        call_timeout: Duration,
        max_route_steps: u32,
    ) -> Self {
        Self {
            router,
            checks,
            call_timeout,
            max_route_steps,
        }
    }

    pub fn run<F: FnMut(&StepOutcome<ModerationAction>)>(
        &self,
        run: &mut ModerationRun,
        deadline: Instant,
        on_step: F,
    ) -> Result<LoopOutcome, EngineError> {
        run_loop(self, run, deadline, on_step)
    }

    /// Moderate `input` within `run_timeout`.
    #[instrument(skip_all)]
    pub fn moderate(
        &self,
        input: impl Into<String>,
        run_timeout: Duration,
    ) -> Result<ModerationRun, EngineError> {
        let mut run = ModerationRun::new(input);
        self.run(&mut run, Instant::now() + run_timeout, |_| {})?;
        Ok(run)
    }
}

impl<R: Router, C: ContentClassifier, G: Generator> Workflow for ModerationWorkflow<R, C, G> {
    type State = ModerationRun;
    type Action = ModerationAction;

    fn name(&self) -> &'static str {
        "moderation"
    }

    fn is_done(&self, state: &ModerationRun) -> bool {
        state.phase() == RunPhase::Done
    }

    fn progress(&self, state: &ModerationRun) -> usize {
        state.checks_run.len() + usize::from(state.final_result.is_some())
    }

    fn max_iterations(&self, _state: &ModerationRun) -> u32 {
        self.max_route_steps
    }

    fn route(
        &self,
        state: &ModerationRun,
        deadline: Instant,
    ) -> Result<Option<ModerationAction>, EngineError> {
        if state.final_result.is_some() {
            return Ok(None);
        }
        if state.error.is_some() {
            return Ok(Some(ModerationAction::Reject));
        }
        let Some(timeout) = call_timeout(deadline, self.call_timeout) else {
            warn!("no budget left for routing");
            return Ok(Some(ModerationAction::Abort));
        };
        match self.router.route(state, timeout) {
            Ok(RouteDecision::Finish) => Ok(Some(ModerationAction::Finish)),
            Ok(RouteDecision::Check(kind)) if self.checks.is_registered(kind) => {
                debug!(check = %kind, "routed to check");
                Ok(Some(ModerationAction::Check(kind)))
            }
            Ok(RouteDecision::Check(kind)) => Err(EngineError::Routing(format!(
                "router chose unregistered check {kind}"
            ))),
            Err(err) if err.is_timeout() => {
                warn!("routing timed out");
                Ok(Some(ModerationAction::Abort))
            }
            Err(err) => Err(err),
        }
    }

    fn execute(
        &self,
        state: &mut ModerationRun,
        action: &ModerationAction,
        deadline: Instant,
    ) -> Result<(), EngineError> {
        match *action {
            ModerationAction::Check(kind) => {
                let outcome = self.checks.run(kind, state.input(), deadline)?;
                state.record_check(kind, outcome)
            }
            ModerationAction::Finish | ModerationAction::Reject => {
                state.finish()?;
                info!(rejected = state.is_rejected(), "moderation finished");
                Ok(())
            }
            ModerationAction::Abort => {
                state.abort("routing timed out".to_string())?;
                info!("moderation aborted");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_reply_accepts_bare_and_embedded_options() {
        let members = CheckKind::ALL;
        assert_eq!(
            parse_route_reply("FINISH", &members),
            Some(RouteDecision::Finish)
        );
        assert_eq!(
            parse_route_reply("{\"next\": \"toxicitychecker\"}", &members),
            Some(RouteDecision::Check(CheckKind::Toxicity))
        );
        assert_eq!(
            parse_route_reply("Next: SensitiveTopicChecker.", &members),
            Some(RouteDecision::Check(CheckKind::SensitiveTopic))
        );
    }

    #[test]
    fn route_reply_rejects_ambiguous_or_unknown_options() {
        let members = CheckKind::ALL;
        assert_eq!(
            parse_route_reply("ToxicityChecker then FINISH", &members),
            None
        );
        assert_eq!(parse_route_reply("nobody", &members), None);
        assert_eq!(
            parse_route_reply("SensitiveTopicChecker", &[CheckKind::Toxicity]),
            None
        );
    }

    #[test]
    fn fixed_router_runs_each_check_once_then_finishes() {
        let router = FixedSequenceRouter::new(vec![CheckKind::Toxicity, CheckKind::SensitiveTopic]);
        let mut run = ModerationRun::new("hi");
        let timeout = Duration::from_secs(1);

        assert_eq!(
            router.route(&run, timeout).expect("route"),
            RouteDecision::Check(CheckKind::Toxicity)
        );
        run.record_check(
            CheckKind::Toxicity,
            CheckOutcome::Pass {
                message: "ok".to_string(),
            },
        )
        .expect("record");
        assert_eq!(
            router.route(&run, timeout).expect("route"),
            RouteDecision::Check(CheckKind::SensitiveTopic)
        );
        run.record_check(
            CheckKind::SensitiveTopic,
            CheckOutcome::Pass {
                message: "ok".to_string(),
            },
        )
        .expect("record");
        assert_eq!(
            router.route(&run, timeout).expect("route"),
            RouteDecision::Finish
        );
    }

    /// Verifies a failing check is attributed to the checker and kept as the reason.
    #[test]
    fn failed_check_sets_error_and_final_reason() {
        let mut run = ModerationRun::new("bad words");
        run.record_check(
            CheckKind::Toxicity,
            CheckOutcome::Fail {
                reason: "toxic".to_string(),
            },
        )
        .expect("record");

        let last = run.messages().last().expect("message");
        assert_eq!(last.author, "ToxicityChecker");
        assert_eq!(last.content, "Error: toxic");
        assert!(run.is_rejected());

        run.finish().expect("finish");
        assert_eq!(run.final_result(), Some("toxic"));
        assert_eq!(run.phase(), RunPhase::Done);
    }

    #[test]
    fn finished_run_refuses_further_changes() {
        let mut run = ModerationRun::new("hello");
        run.finish().expect("finish");
        assert_eq!(run.final_result(), Some("hello"));
        assert!(run.finish().is_err());
        assert!(
            run.record_check(
                CheckKind::Toxicity,
                CheckOutcome::Pass {
                    message: "late".to_string()
                }
            )
            .is_err()
        );
        assert_eq!(run.checks_run().len(), 0);
    }

    #[test]
    fn input_stays_the_user_message() {
        let mut run = ModerationRun::new("original");
        run.record_check(
            CheckKind::Toxicity,
            CheckOutcome::Pass {
                message: "Toxicity check passed. Response: hi".to_string(),
            },
        )
        .expect("record");
        assert_eq!(run.input(), "original");
    }
}
