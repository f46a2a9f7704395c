//! Run orchestrator: one pass over every configured account.
//!
//! The account file is re-read on every cycle. A file that cannot be read
//! or parsed fails the whole cycle; anything that goes wrong inside a single
//! account is logged and the next account is processed.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::processor::{AccountOutcome, AccountProcessor};
use crate::config::AccountConfigSet;
use crate::exchange::ExchangeConnector;
use crate::strategy::LendingStrategy;
use crate::types::{LendError, LendingMode};

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Failure recorded for one account.
#[derive(Debug)]
pub struct AccountFailure {
    /// Position in the account file.
    pub index: usize,
    pub wallet: String,
    pub error: LendError,
}

/// Summary of one pass over all accounts.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub mode: LendingMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Successful accounts, in file order.
    pub processed: Vec<AccountOutcome>,
    pub failed: Vec<AccountFailure>,
}

impl CycleReport {
    pub fn accounts_total(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    pub fn offers_planned(&self) -> usize {
        self.processed.iter().map(|o| o.offers_planned.len()).sum()
    }

    pub fn offers_submitted(&self) -> usize {
        self.processed.iter().map(|o| o.offers_submitted()).sum()
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Something the scheduler can run once per tick.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    /// Run one full cycle. An `Err` is fatal for the process.
    async fn run_cycle(&self) -> Result<CycleReport>;
}

pub struct Orchestrator {
    config_path: PathBuf,
    mode: LendingMode,
    connector: Arc<dyn ExchangeConnector>,
    strategy: Arc<dyn LendingStrategy>,
}

impl Orchestrator {
    pub fn new(
        config_path: impl Into<PathBuf>,
        mode: LendingMode,
        connector: Arc<dyn ExchangeConnector>,
        strategy: Arc<dyn LendingStrategy>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            mode,
            connector,
            strategy,
        }
    }

    /// Process an already-loaded account set, in order, one at a time.
    pub async fn process_accounts(&self, accounts: &AccountConfigSet) -> CycleReport {
        let started_at = Utc::now();
        let cycle_id = Uuid::new_v4();
        let processor = AccountProcessor::new(&*self.connector, &*self.strategy, self.mode);

        info!(
            cycle_id = %cycle_id,
            accounts = accounts.len(),
            mode = %self.mode,
            "Starting run"
        );

        let mut processed = Vec::with_capacity(accounts.len());
        let mut failed = Vec::new();

        for (index, account) in accounts.iter().enumerate() {
            match processor.process(account).await {
                Ok(outcome) => processed.push(outcome),
                Err(error) => {
                    let wallet = account.wallet();
                    warn!(
                        cycle_id = %cycle_id,
                        account = index,
                        wallet = %wallet,
                        "Account failed, skipping: {error}"
                    );
                    failed.push(AccountFailure {
                        index,
                        wallet,
                        error,
                    });
                }
            }
        }

        CycleReport {
            cycle_id,
            mode: self.mode,
            started_at,
            finished_at: Utc::now(),
            processed,
            failed,
        }
    }
}

#[async_trait]
impl CycleRunner for Orchestrator {
    async fn run_cycle(&self) -> Result<CycleReport> {
        let accounts = AccountConfigSet::load(&self.config_path)?;
        Ok(self.process_accounts(&accounts).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
