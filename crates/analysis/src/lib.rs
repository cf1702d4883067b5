//! Analysis step for the market series
//!
//! A [`MarketAnalyzer`] turns the current series into an [`AnalysisResult`]
//! (sentiment, trends, support and resistance bands).
//!
//! - [`heuristic::HeuristicAnalyzer`] - local price / open interest rules
//! - [`http::HttpAnalyzer`] - delegates to a remote analysis endpoint
//! - [`analyzer::MockAnalyzer`] - scripted results for tests
//!
//! [`AnalysisResult`]: market_data::AnalysisResult

pub mod analyzer;
pub mod error;
pub mod heuristic;
pub mod http;

pub use analyzer::{AnalysisRequest, MarketAnalyzer, MockAnalyzer};
pub use error::{AnalysisError, AnalyzeResult};
pub use heuristic::HeuristicAnalyzer;
pub use http::HttpAnalyzer;
