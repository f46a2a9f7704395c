//! Bitfinex margin-funding integration (v1 REST API).
//!
//! API docs: https://docs.bitfinex.com/v1/reference
//! Base URL: https://api.bitfinex.com/v1/
//! Auth: every private call is a POST whose JSON payload (with `request`
//! path and a strictly increasing `nonce`) is base64-encoded into
//! `X-BFX-PAYLOAD` and signed with HMAC-SHA384 into `X-BFX-SIGNATURE`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sha2::Sha384;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{ExchangeClient, ExchangeConnector};
use crate::config::ApiCredentials;
use crate::types::{LoanOfferInstruction, OfferAck, WalletBalance, WalletBalanceSnapshot, WalletKey};

type HmacSha384 = Hmac<Sha384>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://api.bitfinex.com";
const EXCHANGE_NAME: &str = "bitfinex";

const BALANCES_PATH: &str = "/v1/balances";
const NEW_OFFER_PATH: &str = "/v1/offer/new";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// One line of `/v1/balances`. Amounts come back as decimal strings.
#[derive(Debug, Deserialize)]
struct BitfinexBalance {
    #[serde(rename = "type")]
    wallet_type: String,
    currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    available: Decimal,
}

/// Response from `/v1/offer/new`. Only the id is kept.
#[derive(Debug, Deserialize)]
struct BitfinexOffer {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct BitfinexError {
    message: String,
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens Bitfinex sessions. Holds the shared HTTP connection pool; each
/// session carries its own credentials.
pub struct BitfinexConnector {
    http: Client,
    base_url: String,
}

impl BitfinexConnector {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    /// Point the connector at a different host (testnets, proxies).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("LENDBOT/0.1.0 (funding-bot)")
            .build()
            .context("Failed to build HTTP client for Bitfinex")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ExchangeConnector for BitfinexConnector {
    fn connect(&self, credentials: &ApiCredentials) -> Result<Box<dyn ExchangeClient>> {
        if credentials.api_key.is_empty() || credentials.secret().is_empty() {
            anyhow::bail!("Bitfinex API key or secret is empty");
        }
        Ok(Box::new(BitfinexClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            credentials: credentials.clone(),
            last_nonce: AtomicI64::new(0),
        }))
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated Bitfinex session for one account.
pub struct BitfinexClient {
    http: Client,
    base_url: String,
    credentials: ApiCredentials,
    last_nonce: AtomicI64,
}

impl BitfinexClient {
    /// Microsecond timestamp, bumped if the clock hasn't moved since the
    /// previous call.
    fn next_nonce(&self) -> String {
        let now = chrono::Utc::now().timestamp_micros();
        let prev = self
            .last_nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(prev + 1).to_string()
    }

    /// Signed POST to a private endpoint.
    async fn post<T: DeserializeOwned>(&self, path: &str, params: Map<String, Value>) -> Result<T> {
        let payload = build_payload(path, &self.next_nonce(), params)?;
        let signature = sign_payload(self.credentials.secret(), &payload)?;
        let url = format!("{}{path}", self.base_url);

        debug!(url = %url, "Bitfinex request");

        let resp = self
            .http
            .post(&url)
            .header("X-BFX-APIKEY", &self.credentials.api_key)
            .header("X-BFX-PAYLOAD", &payload)
            .header("X-BFX-SIGNATURE", signature)
            .send()
            .await
            .with_context(|| format!("Bitfinex request {path} failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read Bitfinex response for {path}"))?;

        if !status.is_success() {
            anyhow::bail!("Bitfinex API error {status}: {}", error_message(&body));
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse Bitfinex response for {path}"))
    }
}

#[async_trait]
impl ExchangeClient for BitfinexClient {
    async fn wallet_balances(&self) -> Result<WalletBalanceSnapshot> {
        let lines: Vec<BitfinexBalance> = self.post(BALANCES_PATH, Map::new()).await?;
        debug!(lines = lines.len(), "Wallet balances received");
        Ok(snapshot_from_lines(lines))
    }

    async fn submit_loan_offer(&self, offer: &LoanOfferInstruction) -> Result<OfferAck> {
        let resp: BitfinexOffer = self.post(NEW_OFFER_PATH, offer_params(offer)).await?;
        Ok(OfferAck { offer_id: resp.id })
    }

    fn name(&self) -> &str {
        EXCHANGE_NAME
    }
}

// ---------------------------------------------------------------------------
// Request/response helpers
// ---------------------------------------------------------------------------

/// JSON payload with `request` and `nonce` merged in, base64-encoded.
fn build_payload(path: &str, nonce: &str, mut params: Map<String, Value>) -> Result<String> {
    params.insert("request".into(), Value::String(path.to_string()));
    params.insert("nonce".into(), Value::String(nonce.to_string()));
    let raw = serde_json::to_vec(&Value::Object(params)).context("Failed to encode payload")?;
    Ok(STANDARD.encode(raw))
}

/// Hex HMAC-SHA384 of the encoded payload.
fn sign_payload(secret: &str, payload: &str) -> Result<String> {
    let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow!("HMAC error: {e}"))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn offer_params(offer: &LoanOfferInstruction) -> Map<String, Value> {
    let value = json!({
        "currency": offer.currency.to_uppercase(),
        "amount": offer.amount.normalize().to_string(),
        "rate": offer.rate.normalize().to_string(),
        "period": offer.duration_days,
        "direction": "lend",
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn snapshot_from_lines(lines: Vec<BitfinexBalance>) -> WalletBalanceSnapshot {
    lines
        .into_iter()
        .map(|l| {
            (
                WalletKey::new(&l.wallet_type, &l.currency),
                WalletBalance::new(l.amount, l.available),
            )
        })
        .collect()
}

/// Pull the `message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<BitfinexError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
