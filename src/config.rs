//! Configuration loading.
//!
//! The account file is a JSON array, one object per lending account, and is
//! re-read at the start of every cycle. Run-wide switches come from the
//! command line and are frozen into [`RunOptions`] before anything starts.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::LendingMode;

/// Default account file path.
pub const DEFAULT_CONFIG_FILE: &str = "default.conf";

/// Default log file used with `--logtofile`.
pub const DEFAULT_LOG_FILE: &str = "lendbot.log";

/// Default minutes between daemon cycles.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Longest accepted daemon interval (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

// ---------------------------------------------------------------------------
// Account file
// ---------------------------------------------------------------------------

/// One configured lending account.
///
/// Keys are accepted in their canonical form, all lower-case, or
/// snake_case. Missing fields take their zero value.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AccountConfig {
    #[serde(rename = "Bitfinex", alias = "bitfinex")]
    pub bitfinex: BitfinexConf,
    #[serde(rename = "Strategy", alias = "strategy")]
    pub strategy: StrategyConf,
}

/// Exchange credentials and lending limits.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BitfinexConf {
    #[serde(rename = "APIKey", alias = "apikey", alias = "api_key", alias = "ApiKey")]
    pub api_key: String,
    #[serde(
        rename = "APISecret",
        alias = "apisecret",
        alias = "api_secret",
        alias = "ApiSecret"
    )]
    pub api_secret: SecretString,
    /// Currency of the funding wallet to lend from ("usd", "btc", ...).
    #[serde(rename = "ActiveWallet", alias = "activewallet", alias = "active_wallet")]
    pub active_wallet: String,
    /// Ceiling on the total offered per cycle. Negative means unlimited.
    #[serde(
        rename = "MaxActiveAmount",
        alias = "maxactiveamount",
        alias = "max_active_amount"
    )]
    pub max_active_amount: Decimal,
    #[serde(
        rename = "MinLoanUSD",
        alias = "minloanusd",
        alias = "MinLoanUsd",
        alias = "min_loan_usd"
    )]
    pub min_loan_usd: Decimal,
}

impl Default for BitfinexConf {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: SecretString::new(String::new()),
            active_wallet: String::new(),
            max_active_amount: Decimal::ZERO,
            min_loan_usd: Decimal::ZERO,
        }
    }
}

/// Parameters for the fixed-rate strategy. Every field is optional.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StrategyConf {
    /// Yearly rate in percent.
    #[serde(rename = "Rate", alias = "rate")]
    pub rate: Decimal,
    /// Loan period in days (the exchange accepts 2–30).
    #[serde(rename = "Duration", alias = "duration")]
    pub duration_days: u32,
    /// Number of equal offers to split the lendable balance into.
    #[serde(rename = "Splits", alias = "splits")]
    pub splits: u32,
    /// USD value of one unit of the wallet currency.
    #[serde(rename = "UsdPrice", alias = "usdprice", alias = "usd_price")]
    pub usd_price: Decimal,
}

impl Default for StrategyConf {
    fn default() -> Self {
        Self {
            rate: Decimal::new(15, 0),
            duration_days: 2,
            splits: 1,
            usd_price: Decimal::ONE,
        }
    }
}

/// Exchange login for one account.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

impl ApiCredentials {
    pub fn secret(&self) -> &str {
        self.api_secret.expose_secret()
    }
}

impl AccountConfig {
    pub fn credentials(&self) -> ApiCredentials {
        ApiCredentials {
            api_key: self.bitfinex.api_key.clone(),
            api_secret: self.bitfinex.api_secret.clone(),
        }
    }

    /// Active wallet currency, lower-cased.
    pub fn wallet(&self) -> String {
        self.bitfinex.active_wallet.trim().to_lowercase()
    }

    /// The per-cycle lending ceiling, or `None` when unlimited.
    pub fn max_active(&self) -> Option<Decimal> {
        if self.bitfinex.max_active_amount.is_sign_negative() {
            None
        } else {
            Some(self.bitfinex.max_active_amount)
        }
    }
}

/// Ordered list of accounts, in file order.
#[derive(Debug, Clone, Default)]
pub struct AccountConfigSet {
    pub accounts: Vec<AccountConfig>,
}

impl AccountConfigSet {
    /// Load the account list from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let accounts: Vec<AccountConfig> =
            serde_json::from_str(contents).context("Account list is not valid JSON")?;
        Ok(Self { accounts })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AccountConfig> {
        self.accounts.iter()
    }
}

// ---------------------------------------------------------------------------
// Run options
// ---------------------------------------------------------------------------

/// How daemon ticks treat a cycle that is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Start a new cycle on every tick, even if the last one is unfinished.
    #[default]
    Allow,
    /// Skip the tick while a cycle is in flight.
    Skip,
}

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    /// Append to this file.
    File(PathBuf),
}

/// Immutable run-wide settings, built once from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub mode: LendingMode,
    /// `Some(interval)` in daemon mode.
    pub daemon_interval: Option<Duration>,
    pub overlap: OverlapPolicy,
    pub log_target: LogTarget,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            mode: LendingMode::Observe,
            daemon_interval: None,
            overlap: OverlapPolicy::Allow,
            log_target: LogTarget::Stdout,
        }
    }
}
