//! Deterministic, pure logic shared by the step engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod context_store;
pub mod email_format;
pub mod plan_parser;
pub mod recipient;
pub mod router;
pub mod types;
