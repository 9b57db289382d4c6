//! Bank connector interface

use crate::{types::*, Result};
use async_trait::async_trait;

/// Uniform interface to one bank.
///
/// Implementations resolve authentication and wire format behind this
/// trait; the engine only sees accounts, balances and transfer receipts.
#[async_trait]
pub trait BankConnector: Send + Sync {
    /// Bank name this connector serves (lowercase, e.g. "revolut")
    fn bank(&self) -> &str;

    /// List all accounts at this bank, Main included
    async fn list_accounts(&self) -> Result<Vec<Account>>;

    /// Submit a transfer and return the bank's receipt
    async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;

    /// Cheap reachability probe
    async fn health_check(&self) -> Result<()>;
}
