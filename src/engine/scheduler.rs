//! Scheduler: single pass or daemon loop.
//!
//! The first cycle always runs inline at startup. In daemon mode a ticker
//! then fires every interval and each tick dispatches a cycle onto its own
//! task, so a slow cycle never delays the next tick. Whether a tick may
//! start a cycle while another is still running is decided by
//! [`OverlapPolicy`].

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::orchestrator::{CycleReport, CycleRunner};
use crate::config::{OverlapPolicy, RunOptions};

pub struct Scheduler {
    /// `Some` in daemon mode.
    interval: Option<Duration>,
    overlap: OverlapPolicy,
}

impl Scheduler {
    pub fn new(interval: Option<Duration>, overlap: OverlapPolicy) -> Self {
        Self { interval, overlap }
    }

    pub fn from_options(options: &RunOptions) -> Self {
        Self::new(options.daemon_interval, options.overlap)
    }

    /// Run the first cycle, then (in daemon mode) keep ticking forever.
    ///
    /// Returns `Ok` after the single pass when not a daemon. A daemon only
    /// returns when a cycle fails fatally.
    pub async fn run<R: CycleRunner>(&self, runner: Arc<R>) -> Result<()> {
        let report = runner.run_cycle().await.map_err(log_fatal)?;
        log_cycle_report(&report);

        let Some(period) = self.interval else {
            return Ok(());
        };

        info!(
            interval_secs = period.as_secs(),
            overlap = ?self.overlap,
            "Running in daemon mode"
        );

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let in_flight = Arc::new(Semaphore::new(1));
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<anyhow::Error>();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let permit = match self.overlap {
                        OverlapPolicy::Allow => None,
                        OverlapPolicy::Skip => match in_flight.clone().try_acquire_owned() {
                            Ok(permit) => Some(permit),
                            Err(_) => {
                                warn!("Previous run still in progress, skipping tick");
                                continue;
                            }
                        },
                    };

                    let runner = runner.clone();
                    let fatal_tx = fatal_tx.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        match runner.run_cycle().await {
                            Ok(report) => log_cycle_report(&report),
                            Err(e) => {
                                let _ = fatal_tx.send(e);
                            }
                        }
                    });
                }
                Some(e) = fatal_rx.recv() => return Err(log_fatal(e)),
            }
        }
    }
}

fn log_fatal(e: anyhow::Error) -> anyhow::Error {
    error!(error = %format!("{e:#}"), "Run failed fatally");
    e
}

fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle_id = %report.cycle_id,
        accounts = report.accounts_total(),
        failed = report.failed.len(),
        offers_planned = report.offers_planned(),
        offers_submitted = report.offers_submitted(),
        finished_at = %report.finished_at,
        "run finished."
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
