//! Error types for bank connectors

use thiserror::Error;

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Connector errors
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Proxy answered but the bank-side call failed
    #[error("Proxy error for {bank}: {message}")]
    Proxy {
        /// Bank whose proxy reported the failure
        bank: String,
        /// Bank-side error message
        message: String,
    },

    /// No connector registered under that bank name
    #[error("Unknown bank: {0}")]
    UnknownBank(String),

    /// Bank refused the transfer outright
    #[error("Transfer rejected: {0}")]
    TransferRejected(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
