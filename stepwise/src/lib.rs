//! Step-sequenced task executor with pluggable tools, checks and routing.
//!
//! Two workflows share one engine:
//!
//! - **Plan-and-solve** ([`agents::plan_solve`]): a planner writes a
//!   `Plan:` / `#E` plan once, each step runs with earlier results substituted
//!   into its input, and a single solve call consolidates the evidence.
//! - **Moderation** ([`agents::supervisor`]): a conversation is routed through
//!   toxicity and sensitive-topic checks until one fails or the router
//!   decides to finish.
//!
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (plan parsing, evidence
//!   substitution, progress routing). No I/O.
//! - **[`io`]**: Side-effecting collaborators (child processes, files,
//!   prompt rendering), isolated behind traits so tests can script them.
//! - **[`step`]** / **[`looping`]**: the generic `route -> execute` engine.

pub mod agents;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
