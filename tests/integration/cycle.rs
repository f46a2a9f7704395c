//! End-to-end cycles: account file on disk → orchestrator → mock exchange.

use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;

use lendbot::engine::orchestrator::{CycleRunner, Orchestrator};
use lendbot::strategy::fixed::FixedRateStrategy;
use lendbot::types::{LendError, LendingMode};

use crate::log_capture::LogCapture;
use crate::mock_exchange::{MockExchange, RecordingStrategy};

/// Temp account file removed on drop.
struct ConfigFile(PathBuf);

impl ConfigFile {
    fn new(contents: &str) -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("lendbot_it_{}.conf", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        Self(path)
    }

    fn rewrite(&self, contents: &str) {
        std::fs::write(&self.0, contents).unwrap();
    }
}

impl Drop for ConfigFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn account_json(key: &str, wallet: &str, max_active: &str) -> String {
    format!(
        r#"{{"Bitfinex": {{"APIKey": "{key}", "APISecret": "secret-{key}",
            "ActiveWallet": "{wallet}", "MaxActiveAmount": {max_active}, "MinLoanUSD": 50}}}}"#
    )
}

fn config(accounts: &[String]) -> String {
    format!("[{}]", accounts.join(","))
}

fn orchestrator(
    file: &ConfigFile,
    mode: LendingMode,
    exchange: &MockExchange,
    strategy: &Arc<RecordingStrategy<FixedRateStrategy>>,
) -> Orchestrator {
    Orchestrator::new(
        file.0.clone(),
        mode,
        Arc::new(exchange.clone()),
        strategy.clone(),
    )
}

fn recording() -> Arc<RecordingStrategy<FixedRateStrategy>> {
    Arc::new(RecordingStrategy::new(FixedRateStrategy::new()))
}

#[tokio::test]
async fn test_dry_run_logs_offer_without_submitting() {
    let file = ConfigFile::new(&config(&[account_json("k1", "USD", "100")]));
    let exchange = MockExchange::new().with_deposit("k1", "usd", dec!(80), dec!(80));
    let strategy = recording();
    let logs = LogCapture::new();
    let _guard = logs.install();

    let report = orchestrator(&file, LendingMode::DryRun, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(strategy.calls(), vec![("k1".to_string(), dec!(80))]);
    assert!(exchange.submissions().is_empty());
    assert_eq!(report.offers_planned(), 1);
    assert_eq!(report.offers_submitted(), 0);
    assert_eq!(report.processed[0].offers_planned[0].amount, dec!(80));

    let would_offer = logs.containing("Would offer");
    assert_eq!(would_offer.len(), 1, "{:?}", logs.lines());
    assert!(would_offer[0].contains("80 usd"));
    assert!(logs.containing("Offer placed").is_empty());
    assert_eq!(logs.containing("Deposit wallet: 80 usd").len(), 1);
}

#[tokio::test]
async fn test_first_account_outage_does_not_block_second() {
    let file = ConfigFile::new(&config(&[
        account_json("k1", "usd", "100"),
        account_json("k2", "usd", "100"),
    ]));
    let exchange = MockExchange::new()
        .failing_balances("k1")
        .with_deposit("k2", "usd", dec!(75), dec!(75));
    let strategy = recording();
    let logs = LogCapture::new();
    let _guard = logs.install();

    let report = orchestrator(&file, LendingMode::Live, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].index, 0);
    assert!(matches!(report.failed[0].error, LendError::BalanceQuery(_)));

    assert_eq!(report.processed.len(), 1);
    assert_eq!(strategy.calls(), vec![("k2".to_string(), dec!(75))]);
    let submissions = exchange.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, "k2");
    assert_eq!(submissions[0].1.amount, dec!(75));

    let warnings = logs.at_level("WARN");
    assert_eq!(warnings.len(), 1, "{:?}", logs.lines());
    assert!(warnings[0].contains("account=0"));
    assert!(warnings[0].contains("skipping"));
}

#[tokio::test]
async fn test_every_account_visited_in_file_order() {
    let keys = ["k1", "k2", "k3", "k4"];
    let file = ConfigFile::new(&config(
        &keys.iter().map(|k| account_json(k, "usd", "100")).collect::<Vec<_>>(),
    ));
    let exchange = MockExchange::new().failing_balances("k2").failing_balances("k3");
    let strategy = recording();

    let report = orchestrator(&file, LendingMode::Observe, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.accounts_total(), 4);
    assert_eq!(exchange.balance_queries(), keys);
}

#[tokio::test]
async fn test_observe_mode_is_read_only() {
    let file = ConfigFile::new(&config(&[
        account_json("k1", "usd", "100"),
        account_json("k2", "btc", "-1"),
    ]));
    let exchange = MockExchange::new()
        .with_deposit("k1", "usd", dec!(500), dec!(500))
        .with_deposit("k2", "btc", dec!(3), dec!(3));
    let strategy = recording();

    let report = orchestrator(&file, LendingMode::Observe, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    assert!(strategy.calls().is_empty());
    assert!(exchange.submissions().is_empty());
    assert_eq!(report.processed.len(), 2);
    assert_eq!(report.processed[1].deposit.amount, dec!(3));
}

#[tokio::test]
async fn test_live_offer_clipped_to_max_active() {
    let file = ConfigFile::new(&config(&[account_json("k1", "usd", "100")]));
    let exchange = MockExchange::new().with_deposit("k1", "usd", dec!(250), dec!(250));
    let strategy = recording();

    let report = orchestrator(&file, LendingMode::Live, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    let submissions = exchange.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].1.amount, dec!(100));
    assert_eq!(report.offers_submitted(), 1);
}

#[tokio::test]
async fn test_submission_failure_is_per_account() {
    let file = ConfigFile::new(&config(&[
        account_json("k1", "usd", "-1"),
        account_json("k2", "usd", "-1"),
    ]));
    let exchange = MockExchange::new()
        .with_deposit("k1", "usd", dec!(60), dec!(60))
        .with_deposit("k2", "usd", dec!(70), dec!(70))
        .failing_submits("k1");
    let strategy = recording();

    let report = orchestrator(&file, LendingMode::Live, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].error,
        LendError::Submission { submitted: 0, .. }
    ));
    assert_eq!(exchange.submissions().len(), 1);
    assert_eq!(exchange.submissions()[0].0, "k2");
}

#[tokio::test]
async fn test_missing_wallet_is_zero_not_error() {
    let file = ConfigFile::new(&config(&[account_json("k1", "eth", "100")]));
    let exchange = MockExchange::new().with_deposit("k1", "usd", dec!(80), dec!(80));
    let strategy = recording();

    let report = orchestrator(&file, LendingMode::Live, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.processed[0].deposit.amount, dec!(0));
    assert_eq!(strategy.calls(), vec![("k1".to_string(), dec!(0))]);
    assert!(exchange.submissions().is_empty());
}

#[tokio::test]
async fn test_config_reloaded_every_cycle() {
    let file = ConfigFile::new(&config(&[account_json("k1", "usd", "100")]));
    let exchange = MockExchange::new();
    let strategy = recording();
    let orch = orchestrator(&file, LendingMode::Observe, &exchange, &strategy);

    let first = orch.run_cycle().await.unwrap();
    assert_eq!(first.accounts_total(), 1);

    file.rewrite(&config(&[
        account_json("k1", "usd", "100"),
        account_json("k2", "usd", "100"),
    ]));
    let second = orch.run_cycle().await.unwrap();
    assert_eq!(second.accounts_total(), 2);
    assert_ne!(first.cycle_id, second.cycle_id);
    assert_eq!(exchange.balance_queries(), vec!["k1", "k1", "k2"]);
}

#[tokio::test]
async fn test_malformed_config_fails_cycle() {
    let file = ConfigFile::new(r#"[{"Bitfinex": {"APIKey": "k1"}"#);
    let exchange = MockExchange::new();
    let strategy = recording();

    let err = orchestrator(&file, LendingMode::Live, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to parse config file"));
    assert!(exchange.calls().is_empty());
}

#[tokio::test]
async fn test_strategy_overflow_isolated_to_account() {
    let broken = r#"{"Bitfinex": {"APIKey": "k1", "APISecret": "s1", "ActiveWallet": "usd",
        "MaxActiveAmount": -1, "MinLoanUSD": 10000000000},
        "Strategy": {"UsdPrice": 0.00000000000000000001}}"#;
    let file = ConfigFile::new(&config(&[
        broken.to_string(),
        account_json("k2", "usd", "-1"),
    ]));
    let exchange = MockExchange::new()
        .with_deposit("k1", "usd", dec!(100), dec!(100))
        .with_deposit("k2", "usd", dec!(60), dec!(60));
    let strategy = recording();

    let report = orchestrator(&file, LendingMode::Live, &exchange, &strategy)
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].error, LendError::Strategy(_)));
    let submissions = exchange.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, "k2");
}
