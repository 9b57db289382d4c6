//! # Bank Connectors
//!
//! Connectivity layer between the treasury engine and the banks it
//! operates on. Every bank is reached through the same [`BankConnector`]
//! trait; the engine never sees a bank-specific wire format.
//!
//! Two implementations ship here:
//! - [`ProxyConnector`]: talks to a per-bank proxy service over HTTP,
//!   using the uniform `{ok, accounts[], error}` envelope every proxy
//!   exposes regardless of the bank behind it.
//! - [`MockBankConnector`]: deterministic in-memory connector with
//!   scripted transfer statuses, used by the engine's tests and the demo
//!   wiring.
//!
//! Connectors are registered on a [`ConnectorRegistry`] whose registration
//! order is the engine's fixed bank iteration order.

#![forbid(unsafe_code)]

pub mod connector;
pub mod error;
pub mod metrics;
pub mod mock;
pub mod proxy;
pub mod registry;
pub mod types;

pub use connector::BankConnector;
pub use error::{Error, Result};
pub use mock::MockBankConnector;
pub use proxy::ProxyConnector;
pub use registry::ConnectorRegistry;
pub use types::*;

/// Default request timeout for proxy calls (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
