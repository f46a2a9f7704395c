//! Shared types for the LENDBOT daemon.
//!
//! These types form the data model passed between the exchange client,
//! the strategy engine, and the cycle orchestrator. None of them outlive a
//! single cycle.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Wallet type that margin funding is lent from.
pub const DEPOSIT_WALLET: &str = "deposit";

// ---------------------------------------------------------------------------
// Wallet balances
// ---------------------------------------------------------------------------

/// Identifies one balance line: a (wallet type, currency) pair.
///
/// Both parts are lower-cased on construction so lookups are
/// case-insensitive regardless of how the config spells the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletKey {
    pub wallet_type: String,
    pub currency: String,
}

impl WalletKey {
    pub fn new(wallet_type: &str, currency: &str) -> Self {
        Self {
            wallet_type: wallet_type.trim().to_lowercase(),
            currency: currency.trim().to_lowercase(),
        }
    }

    /// Key of the funding (`deposit`) wallet for a currency.
    pub fn deposit(currency: &str) -> Self {
        Self::new(DEPOSIT_WALLET, currency)
    }
}

impl fmt::Display for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.wallet_type, self.currency)
    }
}

/// Total and lendable amounts held in one wallet line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletBalance {
    pub amount: Decimal,
    pub available: Decimal,
}

impl WalletBalance {
    pub const ZERO: WalletBalance = WalletBalance {
        amount: Decimal::ZERO,
        available: Decimal::ZERO,
    };

    pub fn new(amount: Decimal, available: Decimal) -> Self {
        Self { amount, available }
    }
}

/// Point-in-time view of every wallet line on an account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletBalanceSnapshot {
    balances: HashMap<WalletKey, WalletBalance>,
}

impl WalletBalanceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a balance line.
    pub fn insert(&mut self, key: WalletKey, balance: WalletBalance) {
        self.balances.insert(key, balance);
    }

    /// Look up a balance line, returning `None` when the exchange reported
    /// nothing for it.
    pub fn get(&self, key: &WalletKey) -> Option<&WalletBalance> {
        self.balances.get(key)
    }

    /// Look up a balance line, treating an absent line as an empty wallet.
    ///
    /// Exchanges omit wallets that never held funds, so a missing key is a
    /// zero balance and never an error.
    pub fn balance_or_zero(&self, key: &WalletKey) -> WalletBalance {
        self.get(key).copied().unwrap_or(WalletBalance::ZERO)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl FromIterator<(WalletKey, WalletBalance)> for WalletBalanceSnapshot {
    fn from_iter<I: IntoIterator<Item = (WalletKey, WalletBalance)>>(iter: I) -> Self {
        Self {
            balances: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loan offers
// ---------------------------------------------------------------------------

/// A single offer the strategy wants placed on the funding book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanOfferInstruction {
    /// Lower-case currency code, e.g. "usd".
    pub currency: String,
    pub amount: Decimal,
    /// Yearly rate in percent.
    pub rate: Decimal,
    pub duration_days: u32,
}

impl fmt::Display for LoanOfferInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {}%/yr for {}d",
            self.amount.normalize(),
            self.currency,
            self.rate.normalize(),
            self.duration_days,
        )
    }
}

/// Exchange acknowledgement of a submitted offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAck {
    pub offer_id: u64,
}

// ---------------------------------------------------------------------------
// Lending mode
// ---------------------------------------------------------------------------

/// What the account processor is allowed to do after reading balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LendingMode {
    /// Report balances only; neither the strategy nor the submit path runs.
    Observe,
    /// Run the strategy and log its offers without submitting them.
    DryRun,
    /// Run the strategy and submit every offer.
    Live,
}

impl LendingMode {
    pub fn from_flags(update_lends: bool, dry_run: bool) -> Self {
        match (update_lends, dry_run) {
            (false, _) => LendingMode::Observe,
            (true, true) => LendingMode::DryRun,
            (true, false) => LendingMode::Live,
        }
    }

    pub fn runs_strategy(&self) -> bool {
        !matches!(self, LendingMode::Observe)
    }
}

impl fmt::Display for LendingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LendingMode::Observe => write!(f, "OBSERVE"),
            LendingMode::DryRun => write!(f, "DRY RUN"),
            LendingMode::Live => write!(f, "LIVE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Per-account failures. None of these stop a cycle; the orchestrator logs
/// them and moves on to the next account.
#[derive(Debug, thiserror::Error)]
pub enum LendError {
    #[error("Failed to open exchange session: {0:#}")]
    Session(#[source] anyhow::Error),

    #[error("Failed to get wallet funds: {0:#}")]
    BalanceQuery(#[source] anyhow::Error),

    #[error("Failed to execute strategy: {0:#}")]
    Strategy(#[source] anyhow::Error),

    #[error("Failed to submit offer {offer} ({submitted} already submitted): {source:#}")]
    Submission {
        offer: LoanOfferInstruction,
        submitted: usize,
        #[source]
        source: anyhow::Error,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
