//! Core engine: the schedule → run → per-account loop.

pub mod orchestrator;
pub mod processor;
pub mod scheduler;
