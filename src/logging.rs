//! Logging setup.
//!
//! Human-readable `tracing` output to stdout by default, or appended to a
//! log file. Set `LENDBOT_LOG_JSON` for JSON lines; `RUST_LOG` overrides the
//! default `lendbot=info` filter.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogTarget;

const DEFAULT_FILTER: &str = "lendbot=info";

/// Install the global `tracing` subscriber. Fails only if the log file
/// cannot be opened.
pub fn init_logging(target: &LogTarget) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json_logging = std::env::var("LENDBOT_LOG_JSON").is_ok();

    match target {
        LogTarget::Stdout => {
            if json_logging {
                fmt().json().with_env_filter(env_filter).with_target(true).init();
            } else {
                fmt().with_env_filter(env_filter).with_target(true).init();
            }
        }
        LogTarget::File(path) => {
            let file = Mutex::new(open_log_file(path)?);
            if json_logging {
                fmt()
                    .json()
                    .with_env_filter(env_filter)
                    .with_writer(file)
                    .init();
            } else {
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(file)
                    .init();
            }
        }
    }

    Ok(())
}

/// Open the log file for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("error opening log file: {}", path.display()))
}
