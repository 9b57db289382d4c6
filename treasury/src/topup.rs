//! Cross-bank top-ups
//!
//! Moves a fixed amount between Main accounts to bring every bank back
//! over the operating threshold.
//!
//! # Algorithm
//!
//! 1. Partition banks into below-threshold and above-threshold.
//! 2. Source candidates are banks holding at least
//!    `threshold + topup_amount`, ordered by the configured priority
//!    list, not by surplus size.
//! 3. Each needy bank, in snapshot order, takes the fixed amount from
//!    the first candidate whose remaining capacity still covers it;
//!    that candidate's capacity and balance are decremented in memory.
//! 4. A needy bank no candidate can serve gets a shortfall error, not a
//!    failed run.
//!
//! Greedy and non-backtracking: the priority order is a business
//! decision, and predictability wins over optimal allocation. The fixed
//! amount is moved even when the shortfall is smaller, so a top-up can
//! overshoot the threshold.
//!
//! # Example
//!
//! ```text
//! threshold 1000, amount 3000
//! revolut 5000, mercury 400, airwallex 400
//!
//! candidates: revolut (can supply 4000)
//! mercury   <- revolut 3000   (revolut can now supply 1000)
//! airwallex <- nothing        (shortfall error)
//! ```

use crate::balances::BalanceSnapshot;
use crate::metrics::TRANSFERS_TOTAL;
use crate::pending::{PendingTransfer, PendingTransferLedger};
use crate::Result;
use chrono::Utc;
use connectors::{ConnectorRegistry, TransferRequest, TransferStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one planned or executed top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopupStatus {
    /// Dry run: would have been transferred
    Planned,
    /// Settled synchronously
    Completed,
    /// Submitted, settling; recorded as a pending transfer
    InFlight,
    /// Source bank cannot transfer programmatically
    ManualRequired,
    /// Connector error; nothing moved
    Failed,
}

/// One Main-to-Main transfer between banks.
#[derive(Debug, Clone, Serialize)]
pub struct TopupEntry {
    /// Source bank
    pub from_bank: String,
    /// Destination bank
    pub to_bank: String,
    /// Fixed top-up amount
    pub amount: Decimal,
    /// Current status
    pub status: TopupStatus,
    /// Bank-side transaction id once submitted
    pub transaction_id: Option<String>,
}

/// Plan produced before any transfer is submitted.
#[derive(Debug, Clone, Default)]
pub struct TopupPlan {
    /// Allocations in needy-bank order
    pub entries: Vec<TopupEntry>,
    /// Shortfalls: needy banks no candidate could serve
    pub errors: Vec<String>,
}

/// Aggregate result after executing a plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopupOutcome {
    /// Total USD moved (manual and failed entries excluded)
    pub total_moved: Decimal,
    /// Every entry with its final status
    pub topups: Vec<TopupEntry>,
    /// Shortfalls plus execution failures
    pub errors: Vec<String>,
}

struct SourceCandidate {
    bank: String,
    balance: Decimal,
    can_supply: Decimal,
}

/// Plans fixed-amount Main-to-Main transfers.
pub struct CrossBankTopupPlanner {
    threshold: Decimal,
    amount: Decimal,
    priority: Vec<String>,
}

impl CrossBankTopupPlanner {
    /// Planner with the operating threshold, fixed transfer amount and
    /// source priority list.
    pub fn new(threshold: Decimal, amount: Decimal, priority: Vec<String>) -> Self {
        Self {
            threshold,
            amount,
            priority,
        }
    }

    /// Operating threshold this planner enforces.
    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    fn priority_rank(&self, bank: &str) -> usize {
        self.priority
            .iter()
            .position(|p| p == bank)
            .unwrap_or(self.priority.len())
    }

    /// Build the allocation plan. Pure: the snapshot is not modified.
    pub fn plan(&self, snapshot: &BalanceSnapshot) -> TopupPlan {
        let mut plan = TopupPlan::default();

        let needy: Vec<String> = snapshot
            .iter()
            .filter(|(_, b)| b.usd < self.threshold)
            .map(|(bank, _)| bank.clone())
            .collect();

        if needy.is_empty() {
            info!("All banks at or above {} USD, no top-ups needed", self.threshold);
            return plan;
        }

        let mut candidates: Vec<SourceCandidate> = snapshot
            .iter()
            .filter(|(_, b)| b.usd >= self.threshold + self.amount)
            .map(|(bank, b)| SourceCandidate {
                bank: bank.clone(),
                balance: b.usd,
                can_supply: b.usd - self.threshold,
            })
            .collect();
        // Stable sort: banks sharing a rank keep snapshot order.
        candidates.sort_by_key(|c| self.priority_rank(&c.bank));

        for bank in needy {
            match candidates
                .iter_mut()
                .find(|c| c.can_supply >= self.amount)
            {
                Some(source) => {
                    source.can_supply -= self.amount;
                    source.balance -= self.amount;
                    info!(
                        "Planned top-up {} -> {}: {} USD (source left at {}, can still supply {})",
                        source.bank, bank, self.amount, source.balance, source.can_supply
                    );
                    plan.entries.push(TopupEntry {
                        from_bank: source.bank.clone(),
                        to_bank: bank,
                        amount: self.amount,
                        status: TopupStatus::Planned,
                        transaction_id: None,
                    });
                }
                None => {
                    warn!(
                        "No source bank can supply {} USD to top up {}",
                        self.amount, bank
                    );
                    plan.errors.push(format!(
                        "{}: below {} USD and no source can supply the {} USD top-up",
                        bank, self.threshold, self.amount
                    ));
                }
            }
        }

        plan
    }

    /// Execute a plan. Successful entries debit/credit the snapshot in
    /// memory; non-terminal submissions are recorded on the pending
    /// ledger. With `dry_run` the plan is folded into the snapshot and
    /// returned untouched, with no connector or ledger calls.
    pub async fn execute(
        &self,
        plan: TopupPlan,
        registry: &ConnectorRegistry,
        pending: &PendingTransferLedger,
        snapshot: &mut BalanceSnapshot,
        dry_run: bool,
    ) -> Result<TopupOutcome> {
        let mut outcome = TopupOutcome {
            total_moved: Decimal::ZERO,
            topups: Vec::new(),
            errors: plan.errors,
        };

        for entry in plan.entries {
            if dry_run {
                snapshot.debit_usd(&entry.from_bank, entry.amount);
                snapshot.credit_usd(&entry.to_bank, entry.amount);
                outcome.total_moved += entry.amount;
                outcome.topups.push(entry);
                continue;
            }

            let from_main = snapshot
                .get(&entry.from_bank)
                .and_then(|b| b.main_account_id.clone());
            let to_main = snapshot
                .get(&entry.to_bank)
                .and_then(|b| b.main_account_id.clone());

            let (from_main, to_main) = match (from_main, to_main) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    outcome.errors.push(format!(
                        "top-up {} -> {}: Main account unknown on one side",
                        entry.from_bank, entry.to_bank
                    ));
                    continue;
                }
            };

            let request = TransferRequest {
                bank: entry.from_bank.clone(),
                from_account: from_main.clone(),
                to_account: to_main,
                currency: "USD".to_string(),
                amount: entry.amount,
                reference: format!("TOPUP-{}", Uuid::new_v4()),
            };

            match registry.execute_transfer(&request).await {
                Ok(receipt) if receipt.status == TransferStatus::ManualRequired => {
                    TRANSFERS_TOTAL
                        .with_label_values(&["topup", "manual_required"])
                        .inc();
                    outcome.errors.push(format!(
                        "top-up {} -> {}: requires manual transfer",
                        entry.from_bank, entry.to_bank
                    ));
                    outcome.topups.push(TopupEntry {
                        status: TopupStatus::ManualRequired,
                        transaction_id: Some(receipt.transaction_id),
                        ..entry
                    });
                }
                Ok(receipt) => {
                    let status = if receipt.status.is_terminal() {
                        TRANSFERS_TOTAL
                            .with_label_values(&["topup", "completed"])
                            .inc();
                        TopupStatus::Completed
                    } else {
                        TRANSFERS_TOTAL
                            .with_label_values(&["topup", "in_flight"])
                            .inc();
                        pending
                            .add(PendingTransfer {
                                account_id: from_main.clone(),
                                amount: entry.amount,
                                currency: "USD".to_string(),
                                transaction_id: receipt.transaction_id.clone(),
                                bank: entry.from_bank.clone(),
                                recorded_at: Utc::now(),
                            })
                            .await?;
                        TopupStatus::InFlight
                    };

                    info!(
                        "Topped up {} from {}: {} USD ({})",
                        entry.to_bank, entry.from_bank, entry.amount, receipt.transaction_id
                    );
                    snapshot.debit_usd(&entry.from_bank, entry.amount);
                    snapshot.credit_usd(&entry.to_bank, entry.amount);
                    outcome.total_moved += entry.amount;
                    outcome.topups.push(TopupEntry {
                        status,
                        transaction_id: Some(receipt.transaction_id),
                        ..entry
                    });
                }
                Err(e) => {
                    TRANSFERS_TOTAL
                        .with_label_values(&["topup", "failed"])
                        .inc();
                    outcome.errors.push(format!(
                        "top-up {} -> {} failed: {}",
                        entry.from_bank, entry.to_bank, e
                    ));
                    outcome.topups.push(TopupEntry {
                        status: TopupStatus::Failed,
                        ..entry
                    });
                }
            }
        }

        Ok(outcome)
    }
}
