//! Error types for the Prolog query console.

use thiserror::Error;

use crate::QueryId;

/// Main error type for console operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No live connection to the query service
    #[error("Not connected to the query service")]
    NotConnected,

    /// The remote query service rejected or failed a query
    #[error("Query {id} failed: {message}")]
    QueryFailed {
        /// Identifier of the failed query
        id: QueryId,
        /// Message reported by the service
        message: String,
    },

    /// Query handle was already released
    #[error("Query handle already released: {0}")]
    HandleReleased(QueryId),

    /// Timeout waiting for an answer from the service
    #[error("Timeout waiting for answer after {0}ms")]
    Timeout(u64),

    /// Invalid key chord string
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Parse error in a service response
    #[error("Parse error: {0}")]
    ParseError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration could not be decoded
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
