//! Common error types for REMA

use thiserror::Error;

/// Common result type for REMA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across REMA crates
///
/// None of these are fatal: each one aborts only the user action that triggered it,
/// and Session State is left exactly as it was before that action.
#[derive(Error, Debug)]
pub enum Error {
    /// Classification-service response could not be interpreted
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Network round-trip did not complete (connect, timeout, non-2xx status)
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Export requested with nothing to export
    #[error("Nothing to export: {0}")]
    EmptyInput(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Shorthand used by the normalizer
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedPayload(msg.into())
    }
}
