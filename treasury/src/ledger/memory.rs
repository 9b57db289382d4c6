//! In-memory ledger store
//!
//! Backs tests and mock-wired demo runs; implements the same interface
//! as the production Postgres adapter.

use super::{LedgerStore, PayoutRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory ledger store.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    records: RwLock<Vec<PayoutRecord>>,
    properties: RwLock<HashMap<String, String>>,
}

impl InMemoryLedgerStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with payout records
    pub fn with_records(records: Vec<PayoutRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            properties: RwLock::new(HashMap::new()),
        }
    }

    /// Append a payout record
    pub async fn insert_record(&self, record: PayoutRecord) {
        self.records.write().await.push(record);
    }

    /// Snapshot of all properties, for assertions
    pub async fn properties(&self) -> HashMap<String, String> {
        self.properties.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn read_payout_records(&self) -> Result<Vec<PayoutRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn mark_received(&self, reference: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.reference == reference)
            .ok_or_else(|| Error::Store(format!("unknown payout record {}", reference)))?;
        record.received = true;
        Ok(())
    }

    async fn get_property(&self, key: &str) -> Result<Option<String>> {
        Ok(self.properties.read().await.get(key).cloned())
    }

    async fn set_property(&self, key: &str, value: &str) -> Result<()> {
        self.properties
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
