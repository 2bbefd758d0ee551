//! I/O adapters: configuration, child processes and external collaborators.

pub mod atomic;
pub mod classifier;
pub mod config;
pub mod email_tool;
pub mod generator;
pub mod process;
pub mod prompt;
pub mod run_record;
