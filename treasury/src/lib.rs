//! Treasury Consolidation & Reconciliation Engine
//!
//! Automates treasury operations across independent bank accounts:
//! aggregates Main-account balances, sweeps sub-account funds into each
//! bank's Main account, tops up banks under the operating threshold
//! from banks with surplus, and reconciles unexplained incoming amounts
//! against the ledger of expected payouts.
//!
//! # Architecture
//!
//! 1. **Fetch**: Main balances per bank, adjusted for in-flight
//!    transfers ([`balances`])
//! 2. **Internal consolidation**: sub-accounts → Main, per bank
//!    ([`consolidation`])
//! 3. **Refresh**: fold swept amounts into the in-memory snapshot
//! 4. **Cross-bank top-up**: fixed-amount Main-to-Main transfers
//!    ([`topup`])
//!
//! Money in transit is tracked on the [`pending`] ledger; a run is
//! skipped while transfers are still settling so the same funds are
//! never moved twice. Unexplained arrivals are matched to expected
//! payouts by [`reconcile`].
//!
//! The engine consumes two interfaces it does not implement: the
//! [`connectors::BankConnector`] trait per bank and the
//! [`ledger::LedgerStore`] owning payout records and the property
//! store.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use treasury::ledger::InMemoryLedgerStore;
//! use treasury::orchestrator::{ConsolidationOrchestrator, RunOptions};
//! use treasury::Config;
//! use connectors::ConnectorRegistry;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let registry = Arc::new(ConnectorRegistry::new());
//!     let store = Arc::new(InMemoryLedgerStore::new());
//!
//!     let orchestrator = ConsolidationOrchestrator::new(&config, registry, store);
//!     let report = orchestrator
//!         .run_consolidation(RunOptions { dry_run: true, force: false })
//!         .await;
//!     println!("{}: {} USD consolidated",
//!              report.status, report.summary.total_usd_consolidated);
//! }
//! ```

#![forbid(unsafe_code)]

pub mod balances;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod pending;
pub mod reconcile;
pub mod topup;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use orchestrator::{ConsolidationOrchestrator, RunOptions, RunReport, RunStatus};
