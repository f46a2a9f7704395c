//! LENDBOT — Bitfinex margin-funding lending bot
//!
//! Entry point. Parses flags, initialises logging, and hands control to the
//! scheduler: one pass over the configured accounts, or a daemon loop.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use lendbot::cli::Cli;
use lendbot::engine::orchestrator::Orchestrator;
use lendbot::engine::scheduler::Scheduler;
use lendbot::exchange::bitfinex::BitfinexConnector;
use lendbot::logging;
use lendbot::strategy::fixed::FixedRateStrategy;
use lendbot::strategy::LendingStrategy;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let options = Cli::parse().into_options();
    logging::init_logging(&options.log_target)?;

    let strategy = FixedRateStrategy::new();
    info!(
        config = %options.config_path.display(),
        mode = %options.mode,
        daemon = options.daemon_interval.is_some(),
        strategy = strategy.name(),
        "LENDBOT starting up"
    );

    let orchestrator = Arc::new(Orchestrator::new(
        options.config_path.clone(),
        options.mode,
        Arc::new(BitfinexConnector::new()?),
        Arc::new(strategy),
    ));

    Scheduler::from_options(&options).run(orchestrator).await
}
