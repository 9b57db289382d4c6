// End-to-end runs against mock connectors and the in-memory store.

use std::sync::Arc;

use connectors::{ConnectorRegistry, MockBankConnector, TransferStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use treasury::ledger::{InMemoryLedgerStore, LedgerStore, PayoutRecord};
use treasury::orchestrator::{ConsolidationOrchestrator, RunOptions};
use treasury::pending::PendingTransfer;
use treasury::{Config, RunStatus};

fn record(reference: &str, platform: &str, base: Decimal) -> PayoutRecord {
    PayoutRecord {
        reference: reference.to_string(),
        platform: platform.to_string(),
        base_amount: base,
        received: false,
    }
}

fn pending(bank: &str, tx: &str, amount: Decimal) -> PendingTransfer {
    PendingTransfer {
        account_id: "main".to_string(),
        amount,
        currency: "USD".to_string(),
        transaction_id: tx.to_string(),
        bank: bank.to_string(),
        recorded_at: chrono::Utc::now(),
    }
}

/// Three banks; revolut holds a swept-able payout sub-account.
struct Harness {
    revolut: Arc<MockBankConnector>,
    mercury: Arc<MockBankConnector>,
    airwallex: Arc<MockBankConnector>,
    store: Arc<InMemoryLedgerStore>,
    orchestrator: ConsolidationOrchestrator,
}

fn harness(records: Vec<PayoutRecord>, sweep_status: TransferStatus) -> Harness {
    let revolut = Arc::new(
        MockBankConnector::new("revolut")
            .with_account("r-main", "Main", "USD", dec!(5000), true)
            .with_account("r-payouts", "Payouts", "USD", dec!(900), false)
            .with_transfer_status(sweep_status),
    );
    let mercury = Arc::new(
        MockBankConnector::new("mercury").with_account("m-main", "Main", "USD", dec!(400), true),
    );
    let airwallex = Arc::new(
        MockBankConnector::new("airwallex").with_account("a-main", "Main", "USD", dec!(400), true),
    );

    let mut registry = ConnectorRegistry::new();
    registry.register(revolut.clone());
    registry.register(mercury.clone());
    registry.register(airwallex.clone());

    let store = Arc::new(InMemoryLedgerStore::with_records(records));
    let orchestrator =
        ConsolidationOrchestrator::new(&Config::default(), Arc::new(registry), store.clone());

    Harness {
        revolut,
        mercury,
        airwallex,
        store,
        orchestrator,
    }
}

async fn executed_anywhere(h: &Harness) -> usize {
    h.revolut.executed_transfers().await.len()
        + h.mercury.executed_transfers().await.len()
        + h.airwallex.executed_transfers().await.len()
}

#[tokio::test]
async fn full_run_consolidates_tops_up_and_reconciles() {
    let h = harness(
        vec![record("row-1", "Topstep", dec!(1000))],
        TransferStatus::Processing,
    );

    let report = h.orchestrator.run_consolidation(RunOptions::default()).await;

    assert_eq!(report.status, RunStatus::Success);

    // Internal consolidation swept the 900 USD payout account.
    assert_eq!(report.summary.total_usd_consolidated, dec!(900));
    assert_eq!(h.revolut.balance_of("r-payouts").await, Some(dec!(0)));
    assert_eq!(h.revolut.balance_of("r-main").await, Some(dec!(2900))); // 5000 + 900 - 3000

    // The swept balance doubled as a payout signal: 900 matches the
    // Topstep record (expected 880).
    let records = h.store.read_payout_records().await.unwrap();
    assert!(records[0].received);

    // Top-up: after the refresh revolut can supply 4900, enough for one
    // fixed 3000 transfer; airwallex records a shortfall.
    assert_eq!(report.summary.total_usd_transferred, dec!(3000));
    assert_eq!(report.topups.len(), 1);
    assert_eq!(report.topups[0].from_bank, "revolut");
    assert_eq!(report.topups[0].to_bank, "mercury");
    assert!(report.errors.iter().any(|e| e.contains("airwallex")));

    // Both submissions were non-terminal, so both are tracked.
    let raw = h
        .store
        .get_property("treasury.pending_transfers")
        .await
        .unwrap()
        .unwrap();
    let tracked: Vec<PendingTransfer> = serde_json::from_str(&raw).unwrap();
    assert_eq!(tracked.len(), 2);

    // Final balances reflect the in-memory folding, not a re-query.
    let balances = &report.summary.main_account_balances;
    let usd = |bank: &str| {
        balances
            .iter()
            .find(|b| b.bank == bank)
            .map(|b| b.usd)
            .unwrap()
    };
    assert_eq!(usd("revolut"), dec!(2900));
    assert_eq!(usd("mercury"), dec!(3400));
    assert_eq!(usd("airwallex"), dec!(400));
}

#[tokio::test]
async fn scenario_b_greedy_topup_with_shortfall() {
    // No sub-accounts: balances exactly as in the planning scenario.
    let revolut = Arc::new(
        MockBankConnector::new("revolut").with_account("r-main", "Main", "USD", dec!(5000), true),
    );
    let mercury = Arc::new(
        MockBankConnector::new("mercury").with_account("m-main", "Main", "USD", dec!(400), true),
    );
    let airwallex = Arc::new(
        MockBankConnector::new("airwallex").with_account("a-main", "Main", "USD", dec!(400), true),
    );
    let mut registry = ConnectorRegistry::new();
    registry.register(revolut.clone());
    registry.register(mercury);
    registry.register(airwallex);

    let store = Arc::new(InMemoryLedgerStore::new());
    let orchestrator =
        ConsolidationOrchestrator::new(&Config::default(), Arc::new(registry), store);

    let report = orchestrator.run_consolidation(RunOptions::default()).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.topups.len(), 1);
    assert_eq!(report.topups[0].from_bank, "revolut");
    assert_eq!(report.topups[0].to_bank, "mercury");
    assert_eq!(report.topups[0].amount, dec!(3000));
    assert_eq!(
        report
            .errors
            .iter()
            .filter(|e| e.contains("airwallex"))
            .count(),
        1
    );
    assert_eq!(revolut.balance_of("r-main").await, Some(dec!(2000)));
}

#[tokio::test]
async fn scenario_c_pending_gate_skips_without_mutations() {
    let h = harness(
        vec![record("row-1", "Topstep", dec!(1000))],
        TransferStatus::Processing,
    );

    // A transfer is still settling from an earlier run.
    let stale = vec![pending("revolut", "tx-prior", dec!(500))];
    h.store
        .set_property(
            "treasury.pending_transfers",
            &serde_json::to_string(&stale).unwrap(),
        )
        .await
        .unwrap();

    let report = h.orchestrator.run_consolidation(RunOptions::default()).await;

    assert_eq!(report.status, RunStatus::Skipped);
    assert_eq!(executed_anywhere(&h).await, 0);
    assert!(!h.store.read_payout_records().await.unwrap()[0].received);

    // Skipping is idempotent: a second run skips identically.
    let again = h.orchestrator.run_consolidation(RunOptions::default()).await;
    assert_eq!(again.status, RunStatus::Skipped);
    assert_eq!(executed_anywhere(&h).await, 0);
}

#[tokio::test]
async fn force_flag_overrides_the_pending_gate() {
    let h = harness(vec![], TransferStatus::Processing);

    let stale = vec![pending("mercury", "tx-prior", dec!(100))];
    h.store
        .set_property(
            "treasury.pending_transfers",
            &serde_json::to_string(&stale).unwrap(),
        )
        .await
        .unwrap();

    let report = h
        .orchestrator
        .run_consolidation(RunOptions {
            dry_run: false,
            force: true,
        })
        .await;

    assert_eq!(report.status, RunStatus::Success);
    assert!(executed_anywhere(&h).await > 0);
}

#[tokio::test]
async fn recorded_pending_reduces_the_next_snapshot() {
    let h = harness(vec![], TransferStatus::Processing);

    let first = h.orchestrator.run_consolidation(RunOptions::default()).await;
    assert_eq!(first.status, RunStatus::Success);

    // revolut bank-side: 5000 + 900 swept - 3000 topped up = 2900; the
    // 3900 USD still in flight is held against it, floored at zero.
    let checks = h.orchestrator.check_minimum_balances().await.unwrap();
    let revolut = checks.iter().find(|c| c.bank == "revolut").unwrap();
    assert_eq!(revolut.usd, dec!(0));
    assert!(revolut.below_threshold);
}

#[tokio::test]
async fn dry_run_reports_the_plan_without_any_mutation() {
    let h = harness(
        vec![record("row-1", "Topstep", dec!(1000))],
        TransferStatus::Processing,
    );

    let report = h
        .orchestrator
        .run_consolidation(RunOptions {
            dry_run: true,
            force: false,
        })
        .await;

    assert_eq!(report.status, RunStatus::Success);

    // The plan is fully computed...
    assert_eq!(report.summary.total_usd_consolidated, dec!(900));
    assert_eq!(report.summary.total_usd_transferred, dec!(3000));
    assert_eq!(report.consolidation_transfers.len(), 1);
    assert_eq!(report.topups.len(), 1);

    // ...while nothing moved or was written.
    assert_eq!(executed_anywhere(&h).await, 0);
    assert_eq!(h.revolut.balance_of("r-payouts").await, Some(dec!(900)));
    assert!(!h.store.read_payout_records().await.unwrap()[0].received);
    assert!(h
        .store
        .get_property("treasury.pending_transfers")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn completed_transfers_are_not_tracked_as_pending() {
    let h = harness(vec![], TransferStatus::Completed);

    let report = h.orchestrator.run_consolidation(RunOptions::default()).await;
    assert_eq!(report.status, RunStatus::Success);

    let raw = h
        .store
        .get_property("treasury.pending_transfers")
        .await
        .unwrap();
    let tracked: Vec<PendingTransfer> = raw
        .map(|r| serde_json::from_str(&r).unwrap())
        .unwrap_or_default();
    assert!(tracked.is_empty());
}

#[tokio::test]
async fn manual_required_funds_are_found_but_not_moved() {
    let revolut = Arc::new(
        MockBankConnector::new("revolut")
            .with_account("r-main", "Main", "USD", dec!(5000), true)
            .with_account("r-locked", "Escrow", "USD", dec!(600), false)
            .with_manual_account("r-locked"),
    );
    let mut registry = ConnectorRegistry::new();
    registry.register(revolut.clone());

    let store = Arc::new(InMemoryLedgerStore::new());
    let orchestrator =
        ConsolidationOrchestrator::new(&Config::default(), Arc::new(registry), store);

    let report = orchestrator.run_consolidation(RunOptions::default()).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.summary.total_usd_consolidated, dec!(0));
    assert!(report.errors.iter().any(|e| e.contains("manual")));
    assert_eq!(revolut.balance_of("r-locked").await, Some(dec!(600)));
}

#[tokio::test]
async fn one_failing_bank_degrades_gracefully() {
    let revolut = Arc::new(
        MockBankConnector::new("revolut")
            .with_account("r-main", "Main", "USD", dec!(5000), true)
            .with_account("r-payouts", "Payouts", "USD", dec!(250), false),
    );
    let mercury = Arc::new(MockBankConnector::new("mercury").with_listing_failure("proxy down"));
    let mut registry = ConnectorRegistry::new();
    registry.register(revolut.clone());
    registry.register(mercury);

    let store = Arc::new(InMemoryLedgerStore::new());
    let orchestrator =
        ConsolidationOrchestrator::new(&Config::default(), Arc::new(registry), store);

    let report = orchestrator.run_consolidation(RunOptions::default()).await;

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.summary.total_usd_consolidated, dec!(250));
    assert!(report.errors.iter().any(|e| e.contains("proxy down")));
}

#[tokio::test]
async fn scenario_a_reconcile_entry_point() {
    let h = harness(
        vec![record("row-1", "Topstep", dec!(1000))],
        TransferStatus::Processing,
    );

    let outcome = h
        .orchestrator
        .reconcile(dec!(900), "mercury", Some("Incoming"))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.matched_reference.as_deref(), Some("row-1"));
    assert_eq!(outcome.adjustment, Some(dec!(100)));
    assert!(outcome.score.unwrap() > 0.8);

    // Match exclusivity: the record never matches again.
    let second = h
        .orchestrator
        .reconcile(dec!(900), "mercury", None)
        .await
        .unwrap();
    assert!(!second.success);
}

#[tokio::test]
async fn scenario_d_unknown_platform_default_model() {
    let h = harness(
        vec![record("row-9", "BrandNewProp", dec!(500))],
        TransferStatus::Processing,
    );

    let outcome = h
        .orchestrator
        .reconcile(dec!(475), "revolut", None)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.matched_reference.as_deref(), Some("row-9"));
    assert!((outcome.score.unwrap() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn confirming_a_transfer_releases_its_hold() {
    let h = harness(vec![], TransferStatus::Processing);

    let report = h.orchestrator.run_consolidation(RunOptions::default()).await;
    assert_eq!(report.status, RunStatus::Success);

    let raw = h
        .store
        .get_property("treasury.pending_transfers")
        .await
        .unwrap()
        .unwrap();
    let tracked: Vec<PendingTransfer> = serde_json::from_str(&raw).unwrap();
    assert!(!tracked.is_empty());

    for transfer in &tracked {
        assert!(h
            .orchestrator
            .confirm_transfer_received(&transfer.transaction_id)
            .await
            .unwrap());
    }

    // With nothing in flight the next run is no longer gated.
    let next = h.orchestrator.run_consolidation(RunOptions::default()).await;
    assert_eq!(next.status, RunStatus::Success);
}
