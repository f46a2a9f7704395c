//! Account processor.
//!
//! Handles one account for one cycle: open a session, read balances,
//! report the active funding wallet, and (when lending is enabled) run the
//! strategy and submit or log its offers.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::AccountConfig;
use crate::exchange::ExchangeConnector;
use crate::strategy::LendingStrategy;
use crate::types::{
    LendError, LendingMode, LoanOfferInstruction, OfferAck, WalletBalance, WalletKey,
};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What happened for one account in one cycle.
#[derive(Debug, Clone)]
pub struct AccountOutcome {
    pub wallet: String,
    pub api_key: String,
    /// Balance of the active `deposit` wallet (zero if absent).
    pub deposit: WalletBalance,
    /// Offers left after the max-active cap, submitted or not.
    pub offers_planned: Vec<LoanOfferInstruction>,
    pub acks: Vec<OfferAck>,
}

impl AccountOutcome {
    pub fn offers_submitted(&self) -> usize {
        self.acks.len()
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct AccountProcessor<'a> {
    connector: &'a dyn ExchangeConnector,
    strategy: &'a dyn LendingStrategy,
    mode: LendingMode,
}

impl<'a> AccountProcessor<'a> {
    pub fn new(
        connector: &'a dyn ExchangeConnector,
        strategy: &'a dyn LendingStrategy,
        mode: LendingMode,
    ) -> Self {
        Self {
            connector,
            strategy,
            mode,
        }
    }

    /// Process one account.
    ///
    /// A balance query failure returns before the strategy runs. In live
    /// mode the first failed submission aborts the remaining offers; offers
    /// already placed stay placed and the count is carried in the error.
    pub async fn process(&self, account: &AccountConfig) -> Result<AccountOutcome, LendError> {
        let wallet = account.wallet();
        info!(
            wallet = %wallet,
            api_key = %account.bitfinex.api_key,
            "Using Bitfinex user API key"
        );

        let session = self
            .connector
            .connect(&account.credentials())
            .map_err(LendError::Session)?;

        let snapshot = session
            .wallet_balances()
            .await
            .map_err(LendError::BalanceQuery)?;

        let key = WalletKey::deposit(&wallet);
        if snapshot.get(&key).is_none() {
            debug!(
                exchange = session.name(),
                wallet = %wallet,
                lines = snapshot.len(),
                "No deposit line for wallet, treating as empty"
            );
        }
        let deposit = snapshot.balance_or_zero(&key);
        info!(
            exchange = session.name(),
            wallet = %wallet,
            amount = %deposit.amount.normalize(),
            swappable = %deposit.available.normalize(),
            "Deposit wallet: {} {wallet} (swappable: {} {wallet})",
            deposit.amount.normalize(),
            deposit.available.normalize()
        );

        let mut outcome = AccountOutcome {
            wallet: wallet.clone(),
            api_key: account.bitfinex.api_key.clone(),
            deposit,
            offers_planned: Vec::new(),
            acks: Vec::new(),
        };

        if !self.mode.runs_strategy() {
            return Ok(outcome);
        }

        let offers = self
            .strategy
            .decide(account, &snapshot)
            .await
            .map_err(LendError::Strategy)?;
        let offers = enforce_max_active(offers, account.max_active());

        if offers.is_empty() {
            info!(wallet = %wallet, "No offers this cycle");
        }

        for offer in &offers {
            if self.mode != LendingMode::Live {
                info!(
                    wallet = %wallet,
                    currency = %offer.currency,
                    amount = %offer.amount.normalize(),
                    rate = %offer.rate.normalize(),
                    duration_days = offer.duration_days,
                    "[DRY RUN] Would offer {offer}"
                );
                continue;
            }

            let ack = session.submit_loan_offer(offer).await.map_err(|source| {
                LendError::Submission {
                    offer: offer.clone(),
                    submitted: outcome.acks.len(),
                    source,
                }
            })?;
            info!(
                wallet = %wallet,
                offer_id = ack.offer_id,
                "Offer placed: {offer}"
            );
            outcome.acks.push(ack);
        }

        outcome.offers_planned = offers;
        Ok(outcome)
    }
}

/// Clip strategy output to the account's per-cycle ceiling.
///
/// Offers are admitted in order; the one that crosses the cap is cut down
/// to the remaining headroom and everything after it is dropped.
pub fn enforce_max_active(
    offers: Vec<LoanOfferInstruction>,
    cap: Option<Decimal>,
) -> Vec<LoanOfferInstruction> {
    let Some(cap) = cap else {
        return offers;
    };

    let mut remaining = cap;
    let mut admitted = Vec::with_capacity(offers.len());
    let mut dropped = 0usize;

    for mut offer in offers {
        if remaining <= Decimal::ZERO {
            dropped += 1;
            continue;
        }
        if offer.amount > remaining {
            warn!(
                requested = %offer.amount.normalize(),
                allowed = %remaining.normalize(),
                cap = %cap.normalize(),
                "Offer truncated to max active amount"
            );
            offer.amount = remaining;
        }
        remaining -= offer.amount;
        admitted.push(offer);
    }

    if dropped > 0 {
        warn!(dropped, cap = %cap.normalize(), "Offers dropped: max active amount reached");
    }

    admitted
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
