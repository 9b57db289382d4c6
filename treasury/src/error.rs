//! Error types for the treasury engine

use thiserror::Error;

/// Result type for treasury operations
pub type Result<T> = std::result::Result<T, Error>;

/// Treasury engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Bank connector failure
    #[error("Connector error: {0}")]
    Connector(#[from] connectors::Error),

    /// Ledger store failure
    #[error("Ledger store error: {0}")]
    Store(String),

    /// Database failure in the Postgres store adapter
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reconciliation failure
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
