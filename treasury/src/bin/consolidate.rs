//! One-shot consolidation runner
//!
//! Wires connectors and the ledger store from the environment, runs a
//! single consolidation, and prints the report. Scheduling is external;
//! this binary is the unit a scheduler (or an operator) invokes.
//!
//! Flags: `--dry-run` rehearses without moving money, `--force` runs
//! even when transfers are still settling.

use std::sync::Arc;

use connectors::{ConnectorRegistry, MockBankConnector, ProxyConnector};
use rust_decimal::Decimal;
use treasury::ledger::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore};
use treasury::orchestrator::{ConsolidationOrchestrator, RunOptions};
use treasury::Config;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut options = RunOptions::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => options.dry_run = true,
            "--force" => options.force = true,
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }

    info!("Treasury consolidation starting...");

    let config = match std::env::var("TREASURY_CONFIG") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::from_env()?,
    };

    let registry = Arc::new(build_registry(&config)?);
    let failures = registry.health_check_all().await;
    for (bank, message) in &failures {
        warn!("Health check failed for {}: {}", bank, message);
    }

    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => Arc::new(PostgresLedgerStore::connect(url).await?),
        None => {
            warn!("DATABASE_URL not set, using in-memory ledger store");
            Arc::new(InMemoryLedgerStore::new())
        }
    };

    let orchestrator = ConsolidationOrchestrator::new(&config, registry, store);

    for check in orchestrator.check_minimum_balances().await? {
        if check.below_threshold {
            info!("Bank {} below threshold at {} USD", check.bank, check.usd);
        }
    }

    let report = orchestrator.run_consolidation(options).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let outstanding = orchestrator.pending_payouts().await?;
    if !outstanding.is_empty() {
        info!("{} payout(s) still awaiting arrival:", outstanding.len());
        for record in outstanding {
            info!(
                "  {} {} base {} USD",
                record.reference, record.platform, record.base_amount
            );
        }
    }

    Ok(())
}

/// One connector per configured bank: the proxy when a URL is set, the
/// seeded mock otherwise.
fn build_registry(config: &Config) -> anyhow::Result<ConnectorRegistry> {
    let mut registry = ConnectorRegistry::new();

    for bank in &config.banks {
        match &bank.proxy_url {
            Some(url) => {
                let mut connector = ProxyConnector::new(&bank.name, url)?;
                if let Some(token) = &config.proxy_token {
                    connector = connector.with_token(token);
                }
                registry.register(Arc::new(connector));
            }
            None => {
                warn!("No proxy URL for {}, wiring mock connector", bank.name);
                registry.register(Arc::new(
                    MockBankConnector::new(bank.name.clone())
                        .with_account("main", "Main", "USD", Decimal::from(5000), true)
                        .with_account("payouts", "Payouts", "USD", Decimal::from(750), false),
                ));
            }
        }
    }

    Ok(registry)
}
