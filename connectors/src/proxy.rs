//! HTTP proxy connector
//!
//! Each bank is fronted by a small proxy service that owns the bank's
//! credentials and wire format and exposes the uniform
//! `{ok, accounts[], error}` envelope. This connector only speaks that
//! envelope; it never sees a bank API directly.

use crate::{
    connector::BankConnector, types::*, Error, Result, DEFAULT_REQUEST_TIMEOUT_SECONDS,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Connector for one bank's proxy service.
pub struct ProxyConnector {
    bank: String,
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ProxyConnector {
    /// Create a connector for `bank` served at `base_url`.
    pub fn new(bank: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            bank: bank.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            client,
        })
    }

    /// Attach the shared proxy bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn proxy_error(&self, error: Option<String>) -> Error {
        Error::Proxy {
            bank: self.bank.clone(),
            message: error.unwrap_or_else(|| "proxy reported failure without detail".to_string()),
        }
    }
}

#[async_trait]
impl BankConnector for ProxyConnector {
    fn bank(&self) -> &str {
        &self.bank
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let url = format!("{}/accounts", self.base_url);
        let listing: AccountListing = self
            .authed(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !listing.ok {
            return Err(self.proxy_error(listing.error));
        }

        info!(
            "Bank {}: listed {} accounts via proxy",
            self.bank,
            listing.accounts.len()
        );
        Ok(listing.accounts)
    }

    async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let url = format!("{}/transfers", self.base_url);
        let envelope: TransferEnvelope = self
            .authed(self.client.post(&url))
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.ok {
            return Err(self.proxy_error(envelope.error));
        }

        let receipt = envelope
            .transfer
            .ok_or_else(|| self.proxy_error(Some("missing transfer receipt".to_string())))?;

        info!(
            "Bank {}: transfer {} submitted with status {}",
            self.bank, receipt.transaction_id, receipt.status
        );
        Ok(receipt)
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        self.authed(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
