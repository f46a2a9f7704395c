//! Lending strategies.
//!
//! A strategy turns an account's configuration and its current balances
//! into the offers to place this cycle. It never talks to the exchange;
//! submitting (or only logging) the offers is the account processor's job.

pub mod fixed;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AccountConfig;
use crate::types::{LoanOfferInstruction, WalletBalanceSnapshot};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingStrategy: Send + Sync {
    /// Offers to place for this account, in submission order. An empty
    /// list means "nothing to do this cycle".
    async fn decide(
        &self,
        account: &AccountConfig,
        snapshot: &WalletBalanceSnapshot,
    ) -> Result<Vec<LoanOfferInstruction>>;

    /// Strategy name for logging.
    fn name(&self) -> &str;
}
