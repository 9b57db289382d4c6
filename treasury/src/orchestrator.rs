//! Consolidation orchestrator
//!
//! One invocation is one run: fetch balances, sweep sub-accounts into
//! Main, refresh the snapshot in memory, top up banks under the
//! threshold, and report. A run always reaches a terminal state:
//! `SUCCESS`, `SKIPPED` (in-flight transfers and no force flag), or
//! `ERROR` (unexpected failure caught at this boundary, partial results
//! reported). Nothing is retried within a run; retry belongs to the
//! next scheduled invocation.

use crate::balances::{BalanceAggregator, BalanceSnapshot};
use crate::config::Config;
use crate::consolidation::{ConsolidationOutcome, InternalConsolidationPlanner, SweptTransfer};
use crate::ledger::LedgerStore;
use crate::metrics::{PENDING_TRANSFERS, RUNS_TOTAL};
use crate::pending::PendingTransferLedger;
use crate::reconcile::{ReconcileOutcome, ReconciliationMatcher};
use crate::topup::{CrossBankTopupPlanner, TopupEntry};
use crate::Result;
use chrono::{DateTime, Utc};
use connectors::ConnectorRegistry;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run reached DONE; individual errors may still be reported
    Success,
    /// Pending transfers were still settling and `force` was not set
    Skipped,
    /// Unexpected failure; partial results reported
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::Skipped => write!(f, "SKIPPED"),
            RunStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Phases of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Fetch,
    InternalConsolidate,
    Refresh,
    CrossBankTopup,
    Done,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Fetch => write!(f, "FETCH"),
            RunState::InternalConsolidate => write!(f, "INTERNAL_CONSOLIDATE"),
            RunState::Refresh => write!(f, "REFRESH"),
            RunState::CrossBankTopup => write!(f, "CROSS_BANK_TOPUP"),
            RunState::Done => write!(f, "DONE"),
        }
    }
}

/// Flags for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute and report the full plan without any mutating connector
    /// or ledger call
    pub dry_run: bool,
    /// Run even when pending transfers exist
    pub force: bool,
}

/// Final Main balances for one bank.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceReport {
    /// Bank name
    pub bank: String,
    /// Main USD balance after the run's moves
    pub usd: Decimal,
    /// Main EUR balance as fetched
    pub eur: Decimal,
}

/// Money-movement totals for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// USD swept into Main accounts
    pub total_usd_consolidated: Decimal,
    /// USD moved between banks
    pub total_usd_transferred: Decimal,
    /// Main balances after the run, in bank order
    pub main_account_balances: Vec<BalanceReport>,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier, for log correlation
    pub run_id: Uuid,
    /// Terminal status
    pub status: RunStatus,
    /// Totals and final balances
    pub summary: RunSummary,
    /// Sub-account sweeps attempted
    pub consolidation_transfers: Vec<SweptTransfer>,
    /// Cross-bank top-ups attempted
    pub topups: Vec<TopupEntry>,
    /// Every non-fatal error collected along the way
    pub errors: Vec<String>,
    /// Run start
    pub started_at: DateTime<Utc>,
    /// Run end
    pub finished_at: DateTime<Utc>,
}

/// Result of a read-only minimum-balance check.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceCheck {
    /// Bank name
    pub bank: String,
    /// Adjusted Main USD balance
    pub usd: Decimal,
    /// Whether the bank sits under the operating threshold
    pub below_threshold: bool,
}

/// Sequences one consolidation run end to end.
pub struct ConsolidationOrchestrator {
    registry: Arc<ConnectorRegistry>,
    pending: Arc<PendingTransferLedger>,
    aggregator: BalanceAggregator,
    consolidator: InternalConsolidationPlanner,
    topup_planner: CrossBankTopupPlanner,
    matcher: Arc<ReconciliationMatcher>,
}

impl ConsolidationOrchestrator {
    /// Wire the engine over a connector registry and a ledger store.
    pub fn new(
        config: &Config,
        registry: Arc<ConnectorRegistry>,
        store: Arc<dyn LedgerStore>,
    ) -> Self {
        let pending = Arc::new(PendingTransferLedger::new(
            store.clone(),
            config.pending.property_key.clone(),
            config.pending.ttl_hours,
        ));
        let matcher = Arc::new(ReconciliationMatcher::new(
            store,
            config.reconciliation.min_match_score,
        ));

        Self {
            registry: registry.clone(),
            pending: pending.clone(),
            aggregator: BalanceAggregator::new(registry.clone(), pending.clone()),
            consolidator: InternalConsolidationPlanner::new(registry, pending, matcher.clone()),
            topup_planner: CrossBankTopupPlanner::new(
                config.consolidation.threshold_usd,
                config.consolidation.topup_amount_usd,
                config.consolidation.source_priority.clone(),
            ),
            matcher,
        }
    }

    /// Run one consolidation to a terminal state. Never returns an
    /// error: failures become an `ERROR` report with partial results.
    pub async fn run_consolidation(&self, options: RunOptions) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Run {} starting (dry_run={}, force={})",
            run_id, options.dry_run, options.force
        );

        let mut report = RunReport {
            run_id,
            status: RunStatus::Success,
            summary: RunSummary::default(),
            consolidation_transfers: Vec::new(),
            topups: Vec::new(),
            errors: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        match self.run_inner(options, &mut report).await {
            Ok(status) => report.status = status,
            Err(e) => {
                error!("Run {} failed: {}", run_id, e);
                report.errors.push(e.to_string());
                report.status = RunStatus::Error;
            }
        }

        report.finished_at = Utc::now();
        RUNS_TOTAL
            .with_label_values(&[&report.status.to_string()])
            .inc();
        if let Ok(live) = self.pending.list().await {
            PENDING_TRANSFERS.set(live.len() as i64);
        }

        info!(
            "Run {} finished with status {} ({} consolidated, {} transferred, {} errors)",
            run_id,
            report.status,
            report.summary.total_usd_consolidated,
            report.summary.total_usd_transferred,
            report.errors.len()
        );
        report
    }

    async fn run_inner(&self, options: RunOptions, report: &mut RunReport) -> Result<RunStatus> {
        // Skip gate: transfers still settling mean any plan would move
        // the same funds twice.
        if !options.force && self.pending.has_any().await? {
            info!(
                "Run {}: pending transfers still settling, skipping",
                report.run_id
            );
            return Ok(RunStatus::Skipped);
        }

        let mut state = RunState::Fetch;
        info!("Run {}: {}", report.run_id, state);
        let mut snapshot = self.aggregator.snapshot().await?;
        for (_, balance) in snapshot.iter() {
            if let Some(e) = &balance.error {
                report.errors.push(e.clone());
            }
        }

        state = RunState::InternalConsolidate;
        info!("Run {}: {}", report.run_id, state);
        let consolidation = self.consolidator.consolidate_all(options.dry_run).await?;
        report.summary.total_usd_consolidated = consolidation.moved_total;
        report.errors.extend(consolidation.errors.iter().cloned());
        report.consolidation_transfers = consolidation.transfers.clone();

        state = RunState::Refresh;
        info!("Run {}: {}", report.run_id, state);
        self.refresh_snapshot(&mut snapshot, &consolidation);

        state = RunState::CrossBankTopup;
        info!("Run {}: {}", report.run_id, state);
        let plan = self.topup_planner.plan(&snapshot);
        let topups = self
            .topup_planner
            .execute(
                plan,
                &self.registry,
                &self.pending,
                &mut snapshot,
                options.dry_run,
            )
            .await?;
        report.summary.total_usd_transferred = topups.total_moved;
        report.errors.extend(topups.errors.iter().cloned());
        report.topups = topups.topups;

        state = RunState::Done;
        info!("Run {}: {}", report.run_id, state);
        report.summary.main_account_balances = snapshot
            .iter()
            .map(|(bank, balance)| BalanceReport {
                bank: bank.clone(),
                usd: balance.usd,
                eur: balance.eur,
            })
            .collect();

        Ok(RunStatus::Success)
    }

    /// Fold swept amounts into the in-memory snapshot so the top-up
    /// phase sees post-consolidation Main balances without re-querying
    /// the banks.
    fn refresh_snapshot(&self, snapshot: &mut BalanceSnapshot, outcome: &ConsolidationOutcome) {
        for (bank, amount) in &outcome.moved_by_bank {
            snapshot.credit_usd(bank, *amount);
        }
    }

    /// Reconcile an unexplained incoming amount against the expected
    /// payout ledger.
    pub async fn reconcile(
        &self,
        observed: Decimal,
        bank: &str,
        account_name: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        self.matcher.reconcile(observed, bank, account_name, false).await
    }

    /// Confirm a tracked transfer has settled, releasing its hold on
    /// the bank's balance. Returns whether it was still tracked.
    pub async fn confirm_transfer_received(&self, transaction_id: &str) -> Result<bool> {
        self.pending.clear(transaction_id).await
    }

    /// Read-only minimum-balance check across all banks.
    pub async fn check_minimum_balances(&self) -> Result<Vec<BalanceCheck>> {
        let snapshot = self.aggregator.snapshot().await?;
        let threshold = self.topup_planner.threshold();
        Ok(snapshot
            .iter()
            .map(|(bank, balance)| BalanceCheck {
                bank: bank.clone(),
                usd: balance.usd,
                below_threshold: balance.usd < threshold,
            })
            .collect())
    }

    /// Unreconciled payout records still awaiting arrival.
    pub async fn pending_payouts(&self) -> Result<Vec<crate::ledger::PayoutRecord>> {
        Ok(self
            .matcher
            .payout_records()
            .await?
            .into_iter()
            .filter(|r| r.matchable())
            .collect())
    }
}
