//! Pending transfer ledger
//!
//! TTL-bounded log of in-flight transfers, persisted as one JSON list
//! under a well-known property key. Every transfer the orchestrator
//! submits that is not synchronously `completed` must be recorded here
//! before the run ends; the balance aggregator subtracts these amounts
//! so money in transit is never planned over twice.
//!
//! The list is read, filtered and rewritten wholesale. There is no
//! conditional write in the property-store interface, so two concurrent
//! invocations can lose updates; the deployment contract is a single
//! scheduled invoker (daily or manual).

use crate::ledger::LedgerStore;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// A transfer submitted but not yet confirmed settled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTransfer {
    /// Source account the funds left
    pub account_id: String,
    /// Amount in flight
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Bank-side transaction identifier
    pub transaction_id: String,
    /// Bank whose balance the in-flight amount is held against
    pub bank: String,
    /// When the transfer was submitted
    pub recorded_at: DateTime<Utc>,
}

/// Durable log of in-flight transfers.
pub struct PendingTransferLedger {
    store: Arc<dyn LedgerStore>,
    property_key: String,
    ttl: Duration,
}

impl PendingTransferLedger {
    /// Ledger over `store` with the given property key and TTL.
    pub fn new(store: Arc<dyn LedgerStore>, property_key: impl Into<String>, ttl_hours: i64) -> Self {
        Self {
            store,
            property_key: property_key.into(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Live (non-expired) pending transfers.
    ///
    /// Entries older than the TTL are pruned and the trimmed list is
    /// persisted before returning. Expiry is a timeout, not a success:
    /// the transfer may still land, but it no longer blocks planning.
    pub async fn list(&self) -> Result<Vec<PendingTransfer>> {
        let transfers = match self.store.get_property(&self.property_key).await? {
            Some(raw) => serde_json::from_str::<Vec<PendingTransfer>>(&raw)?,
            None => Vec::new(),
        };

        let cutoff = Utc::now() - self.ttl;
        let (live, expired): (Vec<_>, Vec<_>) = transfers
            .into_iter()
            .partition(|t| t.recorded_at > cutoff);

        if !expired.is_empty() {
            for transfer in &expired {
                warn!(
                    "Pending transfer {} ({} {} at {}) expired after {}h without confirmation",
                    transfer.transaction_id,
                    transfer.amount,
                    transfer.currency,
                    transfer.bank,
                    self.ttl.num_hours()
                );
            }
            self.persist(&live).await?;
        }

        Ok(live)
    }

    /// Whether any transfer is still in flight. This is the
    /// orchestrator's skip gate.
    pub async fn has_any(&self) -> Result<bool> {
        Ok(!self.list().await?.is_empty())
    }

    /// Record a newly submitted transfer.
    pub async fn add(&self, transfer: PendingTransfer) -> Result<()> {
        let mut live = self.list().await?;
        info!(
            "Recording pending transfer {}: {} {} at {}",
            transfer.transaction_id, transfer.amount, transfer.currency, transfer.bank
        );
        live.push(transfer);
        self.persist(&live).await
    }

    /// Remove a transfer that has been confirmed received. Returns
    /// whether the transaction was present.
    pub async fn clear(&self, transaction_id: &str) -> Result<bool> {
        let live = self.list().await?;
        let before = live.len();
        let remaining: Vec<_> = live
            .into_iter()
            .filter(|t| t.transaction_id != transaction_id)
            .collect();

        let removed = remaining.len() < before;
        if removed {
            info!("Cleared pending transfer {}", transaction_id);
            self.persist(&remaining).await?;
        }
        Ok(removed)
    }

    /// Sum of in-flight USD amounts held against one bank.
    pub async fn in_flight_usd(&self, bank: &str) -> Result<Decimal> {
        Ok(self
            .list()
            .await?
            .iter()
            .filter(|t| t.bank == bank && t.currency == "USD")
            .map(|t| t.amount)
            .sum())
    }

    async fn persist(&self, transfers: &[PendingTransfer]) -> Result<()> {
        let raw = serde_json::to_string(transfers)?;
        self.store.set_property(&self.property_key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedgerStore;
    use rust_decimal_macros::dec;

    const KEY: &str = "treasury.pending_transfers";

    fn transfer(bank: &str, tx: &str, amount: Decimal, age_hours: i64) -> PendingTransfer {
        PendingTransfer {
            account_id: "main".to_string(),
            amount,
            currency: "USD".to_string(),
            transaction_id: tx.to_string(),
            bank: bank.to_string(),
            recorded_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    fn ledger(store: Arc<InMemoryLedgerStore>) -> PendingTransferLedger {
        PendingTransferLedger::new(store, KEY, 72)
    }

    #[tokio::test]
    async fn test_add_then_list_roundtrip() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let pending = ledger(store.clone());

        pending.add(transfer("revolut", "tx-1", dec!(500), 0)).await.unwrap();
        pending.add(transfer("mercury", "tx-2", dec!(250), 0)).await.unwrap();

        let live = pending.list().await.unwrap();
        assert_eq!(live.len(), 2);
        assert!(pending.has_any().await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned_and_persisted() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let pending = ledger(store.clone());

        let stale = vec![transfer("revolut", "tx-old", dec!(900), 100)];
        store
            .set_property(KEY, &serde_json::to_string(&stale).unwrap())
            .await
            .unwrap();

        assert!(pending.list().await.unwrap().is_empty());
        assert!(!pending.has_any().await.unwrap());

        // The trimmed list was written back, not just filtered in memory.
        let raw = store.get_property(KEY).await.unwrap().unwrap();
        assert_eq!(raw, "[]");
    }

    #[tokio::test]
    async fn test_entries_inside_ttl_survive() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let pending = ledger(store.clone());

        pending.add(transfer("revolut", "tx-1", dec!(100), 71)).await.unwrap();
        assert_eq!(pending.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_removes_only_named_transaction() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let pending = ledger(store.clone());

        pending.add(transfer("revolut", "tx-1", dec!(100), 0)).await.unwrap();
        pending.add(transfer("revolut", "tx-2", dec!(200), 0)).await.unwrap();

        assert!(pending.clear("tx-1").await.unwrap());
        assert!(!pending.clear("tx-1").await.unwrap());

        let live = pending.list().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].transaction_id, "tx-2");
    }

    #[tokio::test]
    async fn test_in_flight_usd_sums_per_bank() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let pending = ledger(store.clone());

        pending.add(transfer("revolut", "tx-1", dec!(100), 0)).await.unwrap();
        pending.add(transfer("revolut", "tx-2", dec!(150), 0)).await.unwrap();
        pending.add(transfer("mercury", "tx-3", dec!(999), 0)).await.unwrap();

        assert_eq!(pending.in_flight_usd("revolut").await.unwrap(), dec!(250));
        assert_eq!(pending.in_flight_usd("mercury").await.unwrap(), dec!(999));
        assert_eq!(pending.in_flight_usd("airwallex").await.unwrap(), dec!(0));
    }
}
