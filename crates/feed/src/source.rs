//! Snapshot source trait and the scripted mock implementation

use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use chrono::Utc;
use market_data::{Citation, DataPoint, OptionSeriesEntry, PointSource};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// One authoritative market reading
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalSnapshot {
    pub data_point: DataPoint,
    pub option_series: Vec<OptionSeriesEntry>,
    pub citations: Vec<Citation>,
}

/// Client trait for external market data - transport agnostic
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch the current snapshot.
    ///
    /// Fails without side effects; callers must not commit anything from a
    /// failed fetch.
    async fn fetch_snapshot(&self) -> FetchResult<ExternalSnapshot>;
}

// ==================== Mock Implementation ====================

/// Scripted snapshot source for tests and offline runs.
///
/// Queued responses are returned in order; once the queue is drained every
/// call returns a quote at the base price.
pub struct MockSnapshotSource {
    responses: Mutex<VecDeque<FetchResult<ExternalSnapshot>>>,
    base_price: f64,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl MockSnapshotSource {
    pub fn new(base_price: f64) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            base_price,
            delay: None,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a successful quote at `price`
    pub fn with_quote(self, price: f64) -> Self {
        let snapshot = quote(price);
        self.responses.lock().push_back(Ok(snapshot));
        self
    }

    /// Queue a failure
    pub fn with_error(self, error: FetchError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block each call until `gate` is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Number of fetches made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_snapshot(&self) -> FetchResult<ExternalSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().pop_front();
        next.unwrap_or_else(|| Ok(quote(self.base_price)))
    }
}

/// Stand-in for a feed that is not configured; every fetch fails with
/// [`FetchError::NotConfigured`].
pub struct UnconfiguredSource {
    reason: String,
}

impl UnconfiguredSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for UnconfiguredSource {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn fetch_snapshot(&self) -> FetchResult<ExternalSnapshot> {
        Err(FetchError::NotConfigured(self.reason.clone()))
    }
}

/// Snapshot with a fixed 2.0 futures premium, stamped now
pub fn quote(price: f64) -> ExternalSnapshot {
    let timestamp = Utc::now().timestamp_millis();
    ExternalSnapshot {
        data_point: DataPoint {
            timestamp,
            label: DataPoint::label_for(timestamp),
            primary_price: price,
            derived_price: price + 2.0,
            open_interest: 450_000,
            volume: 1_000,
            source: PointSource::External,
        },
        option_series: Vec::new(),
        citations: vec![Citation {
            title: "mock feed".to_string(),
            uri: "mock://quote".to_string(),
        }],
    }
}
