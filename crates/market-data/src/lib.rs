//! Market Series Data for MarketSync
//!
//! This crate holds the in-memory market series and the pure operations on it.
//!
//! # Core Components
//!
//! - [`types`] - Data points, option series, analysis results, cycle state
//! - [`generator`] - Stochastic point generator (spot, futures, open interest)
//! - [`store`] - Fixed-capacity series window with append-and-evict
//! - [`reconciler`] - Level-shifting merge of an authoritative point into history
//!
//! # Key Invariants
//!
//! - Timestamps within a series are strictly increasing
//! - A series never grows past its capacity; the oldest point is evicted first
//! - Reconciliation shifts the price level only, never the shape of the history

pub mod error;
pub mod generator;
pub mod reconciler;
pub mod store;
pub mod types;

pub use error::MarketDataError;
pub use generator::{GeneratorParams, SeriesGenerator};
pub use reconciler::{HistoryReconciler, ReconcileOutcome};
pub use store::SeriesStore;
pub use types::{
    round_to, AnalysisResult, Citation, CycleStatus, DataPoint, OptionSeriesEntry, PointSource,
    RefreshCycleState, Sentiment, SeriesKind, Trend,
};

pub type Result<T> = std::result::Result<T, MarketDataError>;
