//! Goal-to-plan assistant: asks a reasoning service for shell and file steps
//! and runs them on the local machine after confirmation.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (risk classification, plan
//!   extraction, shell rewriting, retry schedule). No I/O.
//! - **[`io`]**: Side-effecting adapters (config, HTTP reasoner, shell
//!   processes, sleeping). Each sits behind a trait so tests can script it.
//!
//! Orchestration modules ([`planner`], [`engine`], [`session`]) coordinate
//! core logic with I/O to implement the CLI.

pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod planner;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
