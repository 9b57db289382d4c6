//! Ledger store interface
//!
//! The expected-payout ledger and the timestamped property store are
//! owned by an external collaborator; the engine reads and conditionally
//! mutates them through this trait and never assumes exclusive access.

pub mod memory;
pub mod postgres;

use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// One expected payout row in the external ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutRecord {
    /// Stable row reference used by `mark_received`
    pub reference: String,
    /// Payout platform name as recorded by operations (free-form)
    pub platform: String,
    /// Gross payout amount before platform fees; must be positive to be
    /// matchable
    pub base_amount: Decimal,
    /// Once set, the record never matches again
    pub received: bool,
}

impl PayoutRecord {
    /// Whether the matcher may consider this record at all.
    pub fn matchable(&self) -> bool {
        !self.received && self.base_amount > Decimal::ZERO
    }
}

/// External ledger store: expected payout rows plus a string property
/// store keyed by well-known names.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All payout records, reconciled ones included
    async fn read_payout_records(&self) -> Result<Vec<PayoutRecord>>;

    /// Permanently mark a record received
    async fn mark_received(&self, reference: &str) -> Result<()>;

    /// Read a property value
    async fn get_property(&self, key: &str) -> Result<Option<String>>;

    /// Write a property value, replacing any previous one
    async fn set_property(&self, key: &str, value: &str) -> Result<()>;
}
