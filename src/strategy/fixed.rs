//! Fixed-rate strategy.
//!
//! Offers the whole lendable balance of the active funding wallet at the
//! rate and duration given in the account's `Strategy` section, optionally
//! split into several equal offers. No market data is consulted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use super::LendingStrategy;
use crate::config::{AccountConfig, StrategyConf};
use crate::types::{LoanOfferInstruction, WalletBalanceSnapshot, WalletKey};

/// Shortest and longest loan periods the exchange accepts, in days.
const MIN_DURATION_DAYS: u32 = 2;
const MAX_DURATION_DAYS: u32 = 30;

/// Precision the exchange accepts for funding amounts.
const AMOUNT_DP: u32 = 8;

#[derive(Debug, Default, Clone)]
pub struct FixedRateStrategy;

impl FixedRateStrategy {
    pub fn new() -> Self {
        Self
    }

    fn validate(conf: &StrategyConf) -> Result<()> {
        if !(MIN_DURATION_DAYS..=MAX_DURATION_DAYS).contains(&conf.duration_days) {
            anyhow::bail!(
                "Duration {}d outside {MIN_DURATION_DAYS}-{MAX_DURATION_DAYS} days",
                conf.duration_days
            );
        }
        if conf.rate <= Decimal::ZERO {
            anyhow::bail!("Rate must be positive, got {}", conf.rate);
        }
        if conf.usd_price <= Decimal::ZERO {
            anyhow::bail!("UsdPrice must be positive, got {}", conf.usd_price);
        }
        if conf.splits == 0 {
            anyhow::bail!("Splits must be at least 1");
        }
        Ok(())
    }

    /// Split `total` into at most `splits` pieces of at least `min_size`,
    /// with the rounding remainder folded into the last piece.
    fn split_amount(total: Decimal, splits: u32, min_size: Decimal) -> Result<Vec<Decimal>> {
        if total <= Decimal::ZERO || total < min_size {
            return Ok(Vec::new());
        }

        let share = |n: u32| {
            total
                .checked_div(Decimal::from(n))
                .with_context(|| format!("Cannot split {total} into {n} offers"))
        };

        let mut n = splits.max(1);
        while n > 1 && share(n)? < min_size {
            n -= 1;
        }

        let piece = share(n)?.round_dp_with_strategy(AMOUNT_DP, RoundingStrategy::ToZero);
        let remainder = piece
            .checked_mul(Decimal::from(n - 1))
            .and_then(|head| total.checked_sub(head))
            .with_context(|| format!("Cannot split {total} into {n} offers"))?;
        let mut pieces = vec![piece; (n - 1) as usize];
        pieces.push(remainder);
        Ok(pieces)
    }

    /// Minimum offer size in wallet currency.
    fn min_offer_size(min_loan_usd: Decimal, usd_price: Decimal) -> Result<Decimal> {
        min_loan_usd.checked_div(usd_price).with_context(|| {
            format!("MinLoanUSD {min_loan_usd} at UsdPrice {usd_price} is out of range")
        })
    }
}

#[async_trait]
impl LendingStrategy for FixedRateStrategy {
    async fn decide(
        &self,
        account: &AccountConfig,
        snapshot: &WalletBalanceSnapshot,
    ) -> Result<Vec<LoanOfferInstruction>> {
        let conf = &account.strategy;
        Self::validate(conf)?;

        let currency = account.wallet();
        let lendable = snapshot.balance_or_zero(&WalletKey::deposit(&currency)).available;
        let min_size = Self::min_offer_size(account.bitfinex.min_loan_usd, conf.usd_price)?;

        let pieces = Self::split_amount(lendable, conf.splits, min_size)?;
        if pieces.is_empty() {
            debug!(
                wallet = %currency,
                lendable = %lendable,
                min_size = %min_size,
                "Nothing lendable above minimum loan size"
            );
        }

        Ok(pieces
            .into_iter()
            .map(|amount| LoanOfferInstruction {
                currency: currency.clone(),
                amount,
                rate: conf.rate,
                duration_days: conf.duration_days,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "fixed-rate"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
