//! Side-effecting adapters: configuration, network, processes, time.

pub mod clock;
pub mod config;
pub mod prompt;
pub mod reasoner;
pub mod shell;
