//! Agents and workflows built on the step engine.

pub mod checks;
pub mod executor;
pub mod plan_solve;
pub mod planner;
pub mod supervisor;
