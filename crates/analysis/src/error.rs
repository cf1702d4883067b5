//! Analysis error types

use thiserror::Error;

/// Errors raised by an analysis step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// No API key configured for a remote analyzer
    #[error("Missing credential for analysis service")]
    MissingCredential,

    /// Remote call failed
    #[error("Remote analysis failed: {0}")]
    Remote(String),

    /// Remote answered with something that is not an analysis result
    #[error("Malformed analysis response: {0}")]
    Malformed(String),

    /// Nothing to analyze
    #[error("Series is empty")]
    EmptySeries,
}

pub type AnalyzeResult<T> = Result<T, AnalysisError>;
