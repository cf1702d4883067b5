//! Market data error types

use thiserror::Error;

/// Errors that can occur during series operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// A bulk replacement would change the window length
    #[error("Series length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Timestamps are not strictly increasing
    #[error("Timestamps not strictly increasing at index {index}")]
    UnorderedTimestamps { index: usize },

    /// Capacity must hold at least one point
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(usize),
}
