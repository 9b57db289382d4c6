//! Configuration for the treasury engine

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Treasury engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared bearer token for the bank proxies
    pub proxy_token: Option<String>,

    /// Postgres URL for the production ledger store; in-memory when unset
    pub database_url: Option<String>,

    /// Consolidation and top-up parameters
    pub consolidation: ConsolidationConfig,

    /// Pending transfer tracking
    pub pending: PendingConfig,

    /// Reconciliation matching
    pub reconciliation: ReconciliationConfig,

    /// Banks the engine operates on, in iteration order
    pub banks: Vec<BankEndpoint>,
}

/// One bank and how to reach it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankEndpoint {
    /// Bank name (lowercase)
    pub name: String,

    /// Proxy base URL; the mock connector is wired when unset
    pub proxy_url: Option<String>,
}

/// Consolidation and cross-bank top-up parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Minimum USD balance every Main account should hold
    pub threshold_usd: Decimal,

    /// Fixed top-up transfer size (not fill-to-threshold)
    pub topup_amount_usd: Decimal,

    /// Source-candidate priority for top-ups. Banks not listed rank
    /// after the list, in snapshot order.
    pub source_priority: Vec<String>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            threshold_usd: Decimal::from(1000),
            topup_amount_usd: Decimal::from(3000),
            source_priority: vec![
                "revolut".to_string(),
                "mercury".to_string(),
                "airwallex".to_string(),
            ],
        }
    }
}

/// Pending transfer tracking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Hours before an in-flight transfer is expired as timed out
    pub ttl_hours: i64,

    /// Property-store key holding the pending transfer list
    pub property_key: String,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 72,
            property_key: "treasury.pending_transfers".to_string(),
        }
    }
}

/// Reconciliation matching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Score floor below which a best candidate is still rejected
    pub min_match_score: f64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            min_match_score: 0.80,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy_token: None,
            database_url: None,
            consolidation: ConsolidationConfig::default(),
            pending: PendingConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            banks: vec![
                BankEndpoint {
                    name: "revolut".to_string(),
                    proxy_url: None,
                },
                BankEndpoint {
                    name: "mercury".to_string(),
                    proxy_url: None,
                },
                BankEndpoint {
                    name: "airwallex".to_string(),
                    proxy_url: None,
                },
            ],
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(raw) = std::env::var("TREASURY_THRESHOLD_USD") {
            config.consolidation.threshold_usd = parse_amount("TREASURY_THRESHOLD_USD", &raw)?;
        }

        if let Ok(raw) = std::env::var("TREASURY_TOPUP_USD") {
            config.consolidation.topup_amount_usd = parse_amount("TREASURY_TOPUP_USD", &raw)?;
        }

        if let Ok(raw) = std::env::var("TREASURY_SOURCE_PRIORITY") {
            config.consolidation.source_priority = raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(token) = std::env::var("PROXY_TOKEN") {
            config.proxy_token = Some(token);
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(url);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.banks.is_empty() {
            return Err(Error::Config("no banks configured".to_string()));
        }
        if self.consolidation.threshold_usd < Decimal::ZERO {
            return Err(Error::Config("threshold_usd must be >= 0".to_string()));
        }
        if self.consolidation.topup_amount_usd <= Decimal::ZERO {
            return Err(Error::Config("topup_amount_usd must be > 0".to_string()));
        }
        if self.pending.ttl_hours <= 0 {
            return Err(Error::Config("pending.ttl_hours must be > 0".to_string()));
        }
        Ok(())
    }
}

fn parse_amount(name: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| Error::Config(format!("{}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.consolidation.threshold_usd, dec!(1000));
        assert_eq!(config.consolidation.topup_amount_usd, dec!(3000));
        assert_eq!(config.pending.ttl_hours, 72);
        assert_eq!(config.banks.len(), 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_topup() {
        let mut config = Config::default();
        config.consolidation.topup_amount_usd = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let raw = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&raw).unwrap();
        assert_eq!(back.consolidation.threshold_usd, config.consolidation.threshold_usd);
        assert_eq!(back.pending.property_key, config.pending.property_key);
    }
}
