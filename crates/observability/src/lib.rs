//! Observability infrastructure for MarketSync
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for refresh cycles
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("msync", LogFormat::Pretty)?;
//!
//! // Optional: expose /metrics
//! observability::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, CycleTimer, SyncMetrics};
