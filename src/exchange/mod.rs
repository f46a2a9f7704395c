//! Exchange integrations.
//!
//! Defines the `ExchangeClient` trait (an authenticated session for one
//! account) and the `ExchangeConnector` that opens such sessions, with a
//! Bitfinex implementation.

pub mod bitfinex;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ApiCredentials;
use crate::types::{LoanOfferInstruction, OfferAck, WalletBalanceSnapshot};

/// An exchange session bound to one account's credentials.
///
/// Sessions are opened per account per cycle and dropped afterwards; they
/// are never shared between accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetch every wallet balance line on the account.
    async fn wallet_balances(&self) -> Result<WalletBalanceSnapshot>;

    /// Place one lending offer on the funding book.
    async fn submit_loan_offer(&self, offer: &LoanOfferInstruction) -> Result<OfferAck>;

    /// Exchange name for logging.
    fn name(&self) -> &str;
}

/// Opens authenticated sessions.
#[cfg_attr(test, mockall::automock)]
pub trait ExchangeConnector: Send + Sync {
    fn connect(&self, credentials: &ApiCredentials) -> Result<Box<dyn ExchangeClient>>;
}
