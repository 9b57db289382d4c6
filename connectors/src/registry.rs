//! Connector registry (dispatch plus per-call metrics)

use crate::{
    connector::BankConnector,
    metrics::{CONNECTOR_REQUESTS_TOTAL, CONNECTOR_REQUEST_DURATION},
    types::*,
    Error, Result,
};
use std::sync::Arc;
use tracing::info;

/// Registry of bank connectors.
///
/// Registration order is significant: it is the engine's fixed bank
/// iteration order, so the first registered bank is polled first and is
/// the default top-up source candidate.
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn BankConnector>>,
}

impl ConnectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connectors: Vec::new(),
        }
    }

    /// Register a connector. Replaces any earlier connector for the same
    /// bank, keeping the original position.
    pub fn register(&mut self, connector: Arc<dyn BankConnector>) {
        info!("Registered connector for bank {}", connector.bank());
        if let Some(slot) = self
            .connectors
            .iter_mut()
            .find(|c| c.bank() == connector.bank())
        {
            *slot = connector;
        } else {
            self.connectors.push(connector);
        }
    }

    /// Bank names in registration order
    pub fn banks(&self) -> Vec<String> {
        self.connectors.iter().map(|c| c.bank().to_string()).collect()
    }

    /// Look up a connector by bank name
    pub fn get(&self, bank: &str) -> Result<Arc<dyn BankConnector>> {
        self.connectors
            .iter()
            .find(|c| c.bank() == bank)
            .cloned()
            .ok_or_else(|| Error::UnknownBank(bank.to_string()))
    }

    /// List accounts at one bank, recording metrics
    pub async fn list_accounts(&self, bank: &str) -> Result<Vec<Account>> {
        let connector = self.get(bank)?;

        let start = std::time::Instant::now();
        let result = connector.list_accounts().await;
        CONNECTOR_REQUEST_DURATION
            .with_label_values(&[bank, "list_accounts"])
            .observe(start.elapsed().as_secs_f64());

        let status = if result.is_ok() { "success" } else { "failure" };
        CONNECTOR_REQUESTS_TOTAL
            .with_label_values(&[bank, "list_accounts", status])
            .inc();

        result
    }

    /// Execute a transfer through the owning bank's connector, recording
    /// metrics
    pub async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let connector = self.get(&request.bank)?;

        let start = std::time::Instant::now();
        let result = connector.execute_transfer(request).await;
        CONNECTOR_REQUEST_DURATION
            .with_label_values(&[request.bank.as_str(), "execute_transfer"])
            .observe(start.elapsed().as_secs_f64());

        let status = if result.is_ok() { "success" } else { "failure" };
        CONNECTOR_REQUESTS_TOTAL
            .with_label_values(&[request.bank.as_str(), "execute_transfer", status])
            .inc();

        result
    }

    /// Health-check every registered connector; returns the banks that
    /// failed the probe together with the failure message.
    pub async fn health_check_all(&self) -> Vec<(String, String)> {
        let mut failures = Vec::new();
        for connector in &self.connectors {
            if let Err(e) = connector.health_check().await {
                failures.push((connector.bank().to_string(), e.to_string()));
            }
        }
        failures
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
