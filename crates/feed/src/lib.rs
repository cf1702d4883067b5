//! External market snapshot adapters
//!
//! A [`SnapshotSource`] produces one authoritative quote per call: a data
//! point, the option open interest table, and the sources it was read from.
//!
//! - [`http::HttpSnapshotSource`] - reads a JSON quote document over HTTP
//! - [`source::MockSnapshotSource`] - scripted responses for tests and demos
//! - [`source::UnconfiguredSource`] - placeholder when no endpoint is set

pub mod error;
pub mod http;
pub mod source;

pub use error::{FetchError, FetchResult};
pub use http::HttpSnapshotSource;
pub use source::{ExternalSnapshot, MockSnapshotSource, SnapshotSource, UnconfiguredSource};
