//! Engine error types

use market_data::MarketDataError;
use thiserror::Error;

/// Errors raised while wiring or driving the engine.
///
/// Fetch and analysis failures never surface here; the sequencer turns them
/// into an `Error` cycle status with a fallback result.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Series error: {0}")]
    Series(#[from] MarketDataError),

    #[error("Feed setup failed: {0}")]
    Feed(#[from] feed::FetchError),

    #[error("Analyzer setup failed: {0}")]
    Analyzer(#[from] analysis::AnalysisError),

    #[error("Invalid URL for {field}: {message}")]
    InvalidUrl { field: String, message: String },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
