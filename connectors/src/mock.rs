//! Deterministic mock connector for tests and demo wiring

use crate::{connector::BankConnector, types::*, Error, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// In-memory bank with scripted behavior.
///
/// Unlike a live bank, every outcome is configured up front: the status
/// returned for transfers, which accounts require manual intervention,
/// and whether listing or transfers fail wholesale. Every submitted
/// transfer is kept in an attempt log so callers can assert exactly what
/// was (or was not) executed.
pub struct MockBankConnector {
    bank: String,
    accounts: RwLock<Vec<Account>>,
    transfer_status: TransferStatus,
    manual_accounts: HashSet<String>,
    listing_failure: Option<String>,
    transfer_failure: Option<String>,
    executed: RwLock<Vec<TransferRequest>>,
}

impl MockBankConnector {
    /// Create an empty mock bank. Transfers report `processing` unless
    /// overridden.
    pub fn new(bank: impl Into<String>) -> Self {
        Self {
            bank: bank.into(),
            accounts: RwLock::new(Vec::new()),
            transfer_status: TransferStatus::Processing,
            manual_accounts: HashSet::new(),
            listing_failure: None,
            transfer_failure: None,
            executed: RwLock::new(Vec::new()),
        }
    }

    /// Seed an account
    pub fn with_account(
        mut self,
        account_id: &str,
        display_name: &str,
        currency: &str,
        balance: Decimal,
        is_main: bool,
    ) -> Self {
        let bank = self.bank.clone();
        self.accounts.get_mut().push(Account {
            bank,
            account_id: account_id.to_string(),
            display_name: display_name.to_string(),
            currency: currency.to_string(),
            balance,
            is_main,
        });
        self
    }

    /// Status reported for every accepted transfer
    pub fn with_transfer_status(mut self, status: TransferStatus) -> Self {
        self.transfer_status = status;
        self
    }

    /// Mark an account as movable only by an operator
    pub fn with_manual_account(mut self, account_id: &str) -> Self {
        self.manual_accounts.insert(account_id.to_string());
        self
    }

    /// Fail every listing (and health check) with this message
    pub fn with_listing_failure(mut self, message: &str) -> Self {
        self.listing_failure = Some(message.to_string());
        self
    }

    /// Reject every transfer with this message
    pub fn with_transfer_failure(mut self, message: &str) -> Self {
        self.transfer_failure = Some(message.to_string());
        self
    }

    /// Every transfer submitted to this bank, in order
    pub async fn executed_transfers(&self) -> Vec<TransferRequest> {
        self.executed.read().await.clone()
    }

    /// Current balance of an account, if present
    pub async fn balance_of(&self, account_id: &str) -> Option<Decimal> {
        self.accounts
            .read()
            .await
            .iter()
            .find(|a| a.account_id == account_id)
            .map(|a| a.balance)
    }
}

#[async_trait]
impl BankConnector for MockBankConnector {
    fn bank(&self) -> &str {
        &self.bank
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        if let Some(message) = &self.listing_failure {
            return Err(Error::Proxy {
                bank: self.bank.clone(),
                message: message.clone(),
            });
        }
        Ok(self.accounts.read().await.clone())
    }

    async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        self.executed.write().await.push(request.clone());

        if let Some(message) = &self.transfer_failure {
            return Err(Error::TransferRejected(message.clone()));
        }

        if self.manual_accounts.contains(&request.from_account) {
            info!(
                "Mock bank {}: transfer from {} requires manual action",
                self.bank, request.from_account
            );
            return Ok(TransferReceipt {
                transaction_id: format!("MOCK-{}", Uuid::new_v4()),
                status: TransferStatus::ManualRequired,
            });
        }

        let mut accounts = self.accounts.write().await;
        let from = accounts
            .iter_mut()
            .find(|a| a.account_id == request.from_account && a.currency == request.currency)
            .ok_or_else(|| {
                Error::TransferRejected(format!("unknown source account {}", request.from_account))
            })?;

        if from.balance < request.amount {
            return Err(Error::TransferRejected(format!(
                "insufficient funds in {}: {} < {}",
                request.from_account, from.balance, request.amount
            )));
        }
        from.balance -= request.amount;

        // Destination may live at another bank; only same-bank accounts
        // are credited here.
        if let Some(to) = accounts
            .iter_mut()
            .find(|a| a.account_id == request.to_account && a.currency == request.currency)
        {
            to.balance += request.amount;
        }

        info!(
            "Mock bank {}: moved {} {} from {} to {}",
            self.bank, request.amount, request.currency, request.from_account, request.to_account
        );

        Ok(TransferReceipt {
            transaction_id: format!("MOCK-{}", Uuid::new_v4()),
            status: self.transfer_status,
        })
    }

    async fn health_check(&self) -> Result<()> {
        match &self.listing_failure {
            Some(message) => Err(Error::Proxy {
                bank: self.bank.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}
