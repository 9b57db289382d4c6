//! Internal consolidation
//!
//! Sweeps every non-Main USD balance into the owning bank's Main
//! account. Before each sweep the balance is offered to the
//! reconciliation matcher: any funds sitting on a sub-account are a
//! provisional payout signal, whether or not the sweep itself succeeds.

use crate::metrics::TRANSFERS_TOTAL;
use crate::pending::{PendingTransfer, PendingTransferLedger};
use crate::reconcile::ReconciliationMatcher;
use crate::Result;
use chrono::Utc;
use connectors::{ConnectorRegistry, TransferRequest, TransferStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one attempted sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    /// Dry run: would have been swept
    Planned,
    /// Settled synchronously
    Completed,
    /// Submitted, settling; recorded as a pending transfer
    InFlight,
    /// Connector cannot move these funds programmatically
    ManualRequired,
}

/// One sweep from a sub-account to Main.
#[derive(Debug, Clone, Serialize)]
pub struct SweptTransfer {
    /// Bank the sweep ran at
    pub bank: String,
    /// Source sub-account
    pub from_account: String,
    /// Source account display name
    pub display_name: String,
    /// Full balance moved (or found, for manual outcomes)
    pub amount: Decimal,
    /// Bank-side transaction id, absent in dry runs
    pub transaction_id: Option<String>,
    /// How the sweep ended
    pub status: SweepStatus,
}

/// Aggregate result of an internal consolidation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationOutcome {
    /// Total USD actually moved (manual and failed sweeps excluded)
    pub moved_total: Decimal,
    /// Sweeps attempted, successful and manual
    pub transfers: Vec<SweptTransfer>,
    /// Per-bank failures and manual-intervention notes
    pub errors: Vec<String>,
    /// USD moved into each bank's Main account, for the snapshot refresh
    pub moved_by_bank: HashMap<String, Decimal>,
}

/// Sweeps sub-account balances into Main, bank by bank.
pub struct InternalConsolidationPlanner {
    registry: Arc<ConnectorRegistry>,
    pending: Arc<PendingTransferLedger>,
    matcher: Arc<ReconciliationMatcher>,
}

impl InternalConsolidationPlanner {
    /// Planner over the given registry, pending ledger and matcher.
    pub fn new(
        registry: Arc<ConnectorRegistry>,
        pending: Arc<PendingTransferLedger>,
        matcher: Arc<ReconciliationMatcher>,
    ) -> Self {
        Self {
            registry,
            pending,
            matcher,
        }
    }

    /// Run the sweep across every registered bank. One bank failing
    /// never aborts the others.
    pub async fn consolidate_all(&self, dry_run: bool) -> Result<ConsolidationOutcome> {
        let mut outcome = ConsolidationOutcome::default();

        for bank in self.registry.banks() {
            let accounts = match self.registry.list_accounts(&bank).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    outcome.errors.push(format!("{}: {}", bank, e));
                    continue;
                }
            };

            let main = match accounts.iter().find(|a| a.is_main && a.currency == "USD") {
                Some(main) => main.clone(),
                None => {
                    outcome
                        .errors
                        .push(format!("{}: no Main USD account reported", bank));
                    continue;
                }
            };

            for account in accounts
                .iter()
                .filter(|a| !a.is_main && a.currency == "USD" && a.balance > Decimal::ZERO)
            {
                // Provisional payout signal, independent of whether the
                // sweep below succeeds.
                if let Err(e) = self
                    .matcher
                    .reconcile(account.balance, &bank, Some(account.display_name.as_str()), dry_run)
                    .await
                {
                    warn!(
                        "Reconciliation probe failed for {} {}: {}",
                        bank, account.display_name, e
                    );
                }

                if dry_run {
                    info!(
                        "Dry run: would sweep {} USD from {} {} to Main",
                        account.balance, bank, account.display_name
                    );
                    outcome.moved_total += account.balance;
                    *outcome.moved_by_bank.entry(bank.clone()).or_default() += account.balance;
                    outcome.transfers.push(SweptTransfer {
                        bank: bank.clone(),
                        from_account: account.account_id.clone(),
                        display_name: account.display_name.clone(),
                        amount: account.balance,
                        transaction_id: None,
                        status: SweepStatus::Planned,
                    });
                    continue;
                }

                let request = TransferRequest {
                    bank: bank.clone(),
                    from_account: account.account_id.clone(),
                    to_account: main.account_id.clone(),
                    currency: "USD".to_string(),
                    amount: account.balance,
                    reference: format!("CONSOLIDATE-{}", Uuid::new_v4()),
                };

                match self.registry.execute_transfer(&request).await {
                    Ok(receipt) if receipt.status == TransferStatus::ManualRequired => {
                        TRANSFERS_TOTAL
                            .with_label_values(&["consolidation", "manual_required"])
                            .inc();
                        outcome.errors.push(format!(
                            "{} {}: {} USD found but requires manual transfer",
                            bank, account.display_name, account.balance
                        ));
                        outcome.transfers.push(SweptTransfer {
                            bank: bank.clone(),
                            from_account: account.account_id.clone(),
                            display_name: account.display_name.clone(),
                            amount: account.balance,
                            transaction_id: Some(receipt.transaction_id),
                            status: SweepStatus::ManualRequired,
                        });
                    }
                    Ok(receipt) => {
                        let status = if receipt.status.is_terminal() {
                            TRANSFERS_TOTAL
                                .with_label_values(&["consolidation", "completed"])
                                .inc();
                            SweepStatus::Completed
                        } else {
                            TRANSFERS_TOTAL
                                .with_label_values(&["consolidation", "in_flight"])
                                .inc();
                            self.pending
                                .add(PendingTransfer {
                                    account_id: account.account_id.clone(),
                                    amount: account.balance,
                                    currency: "USD".to_string(),
                                    transaction_id: receipt.transaction_id.clone(),
                                    bank: bank.clone(),
                                    recorded_at: Utc::now(),
                                })
                                .await?;
                            SweepStatus::InFlight
                        };

                        info!(
                            "Swept {} USD from {} {} to Main ({})",
                            account.balance, bank, account.display_name, receipt.transaction_id
                        );
                        outcome.moved_total += account.balance;
                        *outcome.moved_by_bank.entry(bank.clone()).or_default() += account.balance;
                        outcome.transfers.push(SweptTransfer {
                            bank: bank.clone(),
                            from_account: account.account_id.clone(),
                            display_name: account.display_name.clone(),
                            amount: account.balance,
                            transaction_id: Some(receipt.transaction_id),
                            status,
                        });
                    }
                    Err(e) => {
                        TRANSFERS_TOTAL
                            .with_label_values(&["consolidation", "failed"])
                            .inc();
                        outcome
                            .errors
                            .push(format!("{} {}: {}", bank, account.display_name, e));
                    }
                }
            }
        }

        info!(
            "Internal consolidation moved {} USD across {} sweeps ({} errors)",
            outcome.moved_total,
            outcome.transfers.len(),
            outcome.errors.len()
        );
        Ok(outcome)
    }
}
