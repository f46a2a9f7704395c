//! LENDBOT — Bitfinex margin-funding lending bot
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod cli;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod logging;
pub mod strategy;
pub mod types;
