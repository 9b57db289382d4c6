//! Balance aggregation
//!
//! Builds the per-run snapshot of every bank's Main-account balances,
//! adjusted for transfers still in flight. One bank failing to answer
//! never aborts the others; the failure is carried in the snapshot and
//! the bank planned around.

use crate::pending::PendingTransferLedger;
use crate::Result;
use connectors::ConnectorRegistry;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info};

/// Main-account view of one bank within a run.
#[derive(Debug, Clone)]
pub struct BankBalance {
    /// Main USD balance after the pending adjustment, floored at zero
    pub usd: Decimal,
    /// Main EUR balance, reported but never planned over
    pub eur: Decimal,
    /// Sum of in-flight USD subtracted from the raw balance
    pub pending_reduction: Decimal,
    /// Main USD account identifier, when the bank reported one
    pub main_account_id: Option<String>,
    /// Fetch failure for this bank, if any
    pub error: Option<String>,
}

impl BankBalance {
    fn unavailable(message: String) -> Self {
        Self {
            usd: Decimal::ZERO,
            eur: Decimal::ZERO,
            pending_reduction: Decimal::ZERO,
            main_account_id: None,
            error: Some(message),
        }
    }
}

/// Per-bank balances in bank iteration order.
#[derive(Debug, Clone, Default)]
pub struct BalanceSnapshot {
    entries: Vec<(String, BankBalance)>,
}

impl BalanceSnapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bank's balance, keeping insertion order
    pub fn insert(&mut self, bank: impl Into<String>, balance: BankBalance) {
        self.entries.push((bank.into(), balance));
    }

    /// Balance for one bank
    pub fn get(&self, bank: &str) -> Option<&BankBalance> {
        self.entries.iter().find(|(b, _)| b == bank).map(|(_, bal)| bal)
    }

    /// Mutable balance for one bank
    pub fn get_mut(&mut self, bank: &str) -> Option<&mut BankBalance> {
        self.entries
            .iter_mut()
            .find(|(b, _)| b == bank)
            .map(|(_, bal)| bal)
    }

    /// Iterate banks in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BankBalance)> {
        self.entries.iter().map(|(b, bal)| (b, bal))
    }

    /// Add consolidated funds to a bank's USD balance in memory
    pub fn credit_usd(&mut self, bank: &str, amount: Decimal) {
        if let Some(balance) = self.get_mut(bank) {
            balance.usd += amount;
        }
    }

    /// Remove transferred funds from a bank's USD balance in memory,
    /// floored at zero
    pub fn debit_usd(&mut self, bank: &str, amount: Decimal) {
        if let Some(balance) = self.get_mut(bank) {
            balance.usd = (balance.usd - amount).max(Decimal::ZERO);
        }
    }
}

/// Fetches and adjusts Main-account balances for every registered bank.
pub struct BalanceAggregator {
    registry: Arc<ConnectorRegistry>,
    pending: Arc<PendingTransferLedger>,
}

impl BalanceAggregator {
    /// Aggregator over the given registry and pending ledger.
    pub fn new(registry: Arc<ConnectorRegistry>, pending: Arc<PendingTransferLedger>) -> Self {
        Self { registry, pending }
    }

    /// Build the adjusted snapshot for all banks.
    pub async fn snapshot(&self) -> Result<BalanceSnapshot> {
        let mut snapshot = BalanceSnapshot::new();

        for bank in self.registry.banks() {
            let balance = match self.registry.list_accounts(&bank).await {
                Ok(accounts) => {
                    let main_usd = accounts.iter().find(|a| a.is_main && a.currency == "USD");
                    let main_eur = accounts.iter().find(|a| a.is_main && a.currency == "EUR");

                    match main_usd {
                        Some(main) => BankBalance {
                            usd: main.balance,
                            eur: main_eur.map(|a| a.balance).unwrap_or(Decimal::ZERO),
                            pending_reduction: Decimal::ZERO,
                            main_account_id: Some(main.account_id.clone()),
                            error: None,
                        },
                        None => BankBalance::unavailable(format!(
                            "{}: no Main USD account reported",
                            bank
                        )),
                    }
                }
                Err(e) => {
                    error!("Balance fetch failed for {}: {}", bank, e);
                    BankBalance::unavailable(format!("{}: {}", bank, e))
                }
            };
            snapshot.insert(bank, balance);
        }

        // Subtract in-flight amounts so money already moving is not
        // planned over a second time.
        let in_flight = self.pending.list().await?;
        for (bank, balance) in snapshot.entries.iter_mut() {
            let reduction: Decimal = in_flight
                .iter()
                .filter(|t| t.bank == *bank && t.currency == "USD")
                .map(|t| t.amount)
                .sum();
            if reduction > Decimal::ZERO {
                info!(
                    "Bank {}: reducing snapshot balance by {} in-flight USD",
                    bank, reduction
                );
            }
            balance.pending_reduction = reduction;
            balance.usd = (balance.usd - reduction).max(Decimal::ZERO);
        }

        Ok(snapshot)
    }
}
