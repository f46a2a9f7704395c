//! Command-line flags.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{
    LogTarget, OverlapPolicy, RunOptions, DEFAULT_CONFIG_FILE, DEFAULT_INTERVAL_MINUTES,
    DEFAULT_LOG_FILE, MAX_INTERVAL_MINUTES,
};
use crate::types::LendingMode;

#[derive(Debug, Parser)]
#[command(name = "lendbot", version, about = "Bitfinex margin-funding lending bot")]
pub struct Cli {
    /// Configuration file
    #[arg(long = "conf", default_value = DEFAULT_CONFIG_FILE)]
    pub conf: PathBuf,

    /// Update lend offerings
    #[arg(long = "updatelends")]
    pub update_lends: bool,

    /// Output strategy decisions without placing orders
    #[arg(long = "dryrun")]
    pub dry_run: bool,

    /// Write log to file instead of stdout
    #[arg(long = "logtofile")]
    pub log_to_file: bool,

    /// Log file used with --logtofile
    #[arg(long = "logfile", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Run continuously
    #[arg(long)]
    pub daemon: bool,

    /// Minutes between iterations when run as daemon
    #[arg(long, default_value_t = DEFAULT_INTERVAL_MINUTES,
          value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MINUTES))]
    pub interval: u64,

    /// Skip a daemon tick while the previous run is still going
    #[arg(long = "skip-overlapping")]
    pub skip_overlapping: bool,
}

impl Cli {
    pub fn into_options(self) -> RunOptions {
        RunOptions {
            config_path: self.conf,
            mode: LendingMode::from_flags(self.update_lends, self.dry_run),
            daemon_interval: self
                .daemon
                .then(|| Duration::from_secs(self.interval.saturating_mul(60))),
            overlap: if self.skip_overlapping {
                OverlapPolicy::Skip
            } else {
                OverlapPolicy::Allow
            },
            log_target: if self.log_to_file {
                LogTarget::File(self.log_file)
            } else {
                LogTarget::Stdout
            },
        }
    }
}
