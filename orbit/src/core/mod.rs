//! Deterministic, pure logic shared by the planner and the engine.
//!
//! Core modules must be free of I/O side effects. They operate on strings and
//! in-memory values and return deterministic outputs suitable for tests.

pub mod path;
pub mod plan;
pub mod retry;
pub mod risk;
pub mod shell;
pub mod types;
