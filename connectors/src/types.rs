//! Shared types for bank connectors

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bank account as reported by a connector.
///
/// Ephemeral: fetched fresh on every engine run, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    /// Bank this account belongs to
    pub bank: String,
    /// Bank-side account identifier
    pub account_id: String,
    /// Human-readable account name
    pub display_name: String,
    /// ISO currency code (e.g. "USD")
    pub currency: String,
    /// Current balance
    pub balance: Decimal,
    /// Whether this is the bank's designated Main (settlement) account
    pub is_main: bool,
}

/// Transfer instruction handed to a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Bank executing the transfer (the source side)
    pub bank: String,
    /// Source account identifier
    pub from_account: String,
    /// Destination account identifier (same bank, or a beneficiary the
    /// proxy resolves for cross-bank moves)
    pub to_account: String,
    /// ISO currency code
    pub currency: String,
    /// Amount to move
    pub amount: Decimal,
    /// End-to-end reference carried on the transfer
    pub reference: String,
}

/// Connector's answer to a submitted transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Bank-side transaction identifier
    pub transaction_id: String,
    /// Status at submission time
    pub status: TransferStatus,
}

/// Transfer status as reported by a bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Settled synchronously; nothing left in flight
    Completed,
    /// Accepted and being processed
    Processing,
    /// Bank queued an internal consolidation request
    ConsolidationRequested,
    /// Bank cannot move these funds programmatically; an operator must
    ManualRequired,
    /// Submitted, not yet accepted
    Pending,
}

impl TransferStatus {
    /// True when no follow-up settlement is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Completed => write!(f, "completed"),
            TransferStatus::Processing => write!(f, "processing"),
            TransferStatus::ConsolidationRequested => write!(f, "consolidation_requested"),
            TransferStatus::ManualRequired => write!(f, "manual_required"),
            TransferStatus::Pending => write!(f, "pending"),
        }
    }
}

/// Uniform proxy envelope for account listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountListing {
    /// Whether the proxy call succeeded bank-side
    pub ok: bool,
    /// Accounts, empty on failure
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Bank-side error message when `ok` is false
    #[serde(default)]
    pub error: Option<String>,
}

/// Uniform proxy envelope for transfer submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEnvelope {
    /// Whether the proxy call succeeded bank-side
    pub ok: bool,
    /// Receipt, present when `ok` is true
    #[serde(default)]
    pub transfer: Option<TransferReceipt>,
    /// Bank-side error message when `ok` is false
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_serde_shape() {
        let json = serde_json::to_string(&TransferStatus::ConsolidationRequested).unwrap();
        assert_eq!(json, "\"consolidation_requested\"");

        let parsed: TransferStatus = serde_json::from_str("\"manual_required\"").unwrap();
        assert_eq!(parsed, TransferStatus::ManualRequired);
    }

    #[test]
    fn test_only_completed_is_terminal() {
        assert!(TransferStatus::Completed.is_terminal());
        assert!(!TransferStatus::Processing.is_terminal());
        assert!(!TransferStatus::ConsolidationRequested.is_terminal());
        assert!(!TransferStatus::ManualRequired.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
    }

    #[test]
    fn test_listing_defaults_on_failure_shape() {
        let listing: AccountListing =
            serde_json::from_str(r#"{"ok": false, "error": "auth expired"}"#).unwrap();
        assert!(!listing.ok);
        assert!(listing.accounts.is_empty());
        assert_eq!(listing.error.as_deref(), Some("auth expired"));
    }

    #[test]
    fn test_account_roundtrip() {
        let account = Account {
            bank: "revolut".to_string(),
            account_id: "acc-1".to_string(),
            display_name: "Main".to_string(),
            currency: "USD".to_string(),
            balance: dec!(1234.56),
            is_main: true,
        };
        let json = serde_json::to_string(&account).unwrap();
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }
}
