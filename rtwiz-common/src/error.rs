//! Common error types for the RT wizard services

use thiserror::Error;

/// Common result type for RT wizard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the RT wizard crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database bridge unreachable (connect failure, timeout)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Data store rejected a read or write
    #[error("Query error: {0}")]
    Query(String),

    /// Bridge replied with something that is not a bridge reply
    #[error("Malformed bridge response: {0}")]
    MalformedResponse(String),

    /// Invalid patient identifier, row shape or other input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Some per-record operations failed while others succeeded
    #[error("Partial failure: {failed} of {total} record operations failed")]
    PartialFailure { failed: usize, total: usize },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
