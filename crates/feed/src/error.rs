//! Fetch error types

use thiserror::Error;

/// Errors raised while fetching an external snapshot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// No API key configured
    #[error("Missing credential for market feed")]
    MissingCredential,

    /// The remote rejected the API key
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Network or HTTP failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body was not a readable quote document
    #[error("Unparsable response: {0}")]
    Unparsable(String),

    /// Required numeric fields were absent or not positive
    #[error("Insufficient data, missing: {}", .0.join(", "))]
    InsufficientData(Vec<String>),

    /// Source cannot be used with the current configuration
    #[error("Feed not configured: {0}")]
    NotConfigured(String),
}

pub type FetchResult<T> = Result<T, FetchError>;
