//! Prometheus metrics for the refresh pipeline
//!
//! # Metrics
//!
//! * `marketsync_cycles_total{outcome}` - finished cycles by outcome
//! * `marketsync_cycle_duration_seconds` - wall time of a cycle
//! * `marketsync_points_appended_total` - points appended to the series
//! * `marketsync_reconciliations_total` - history rewrites
//! * `marketsync_skipped_ticks_total` - scheduler ticks dropped while busy
//! * `marketsync_series_length` - current number of points
//!
//! Without an installed recorder every handle is a no-op, so tests can
//! construct [`SyncMetrics`] freely.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Start the Prometheus exporter on `0.0.0.0:port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

#[derive(Clone)]
pub struct SyncMetrics {
    cycles_completed: Counter,
    cycles_failed: Counter,
    cycles_discarded: Counter,
    cycle_duration: Histogram,
    points_appended: Counter,
    reconciliations: Counter,
    skipped_ticks: Counter,
    series_length: Gauge,
    instrument: String,
}

impl SyncMetrics {
    pub fn new(instrument: &str) -> Self {
        let name = instrument.to_string();
        let cycles = |outcome: &'static str| {
            counter!("marketsync_cycles_total", "instrument" => name.clone(), "outcome" => outcome)
        };

        Self {
            cycles_completed: cycles("completed"),
            cycles_failed: cycles("failed"),
            cycles_discarded: cycles("discarded"),
            cycle_duration: histogram!(
                "marketsync_cycle_duration_seconds",
                "instrument" => name.clone()
            ),
            points_appended: counter!(
                "marketsync_points_appended_total",
                "instrument" => name.clone()
            ),
            reconciliations: counter!(
                "marketsync_reconciliations_total",
                "instrument" => name.clone()
            ),
            skipped_ticks: counter!("marketsync_skipped_ticks_total", "instrument" => name.clone()),
            series_length: gauge!("marketsync_series_length", "instrument" => name.clone()),
            instrument: name,
        }
    }

    /// Record a finished cycle. Unknown outcomes count as failed.
    pub fn record_cycle(&self, outcome: &str, duration: Duration) {
        match outcome {
            "completed" => self.cycles_completed.increment(1),
            "discarded" => self.cycles_discarded.increment(1),
            _ => self.cycles_failed.increment(1),
        }
        self.cycle_duration.record(duration.as_secs_f64());
    }

    pub fn point_appended(&self) {
        self.points_appended.increment(1);
    }

    pub fn reconciled(&self) {
        self.reconciliations.increment(1);
    }

    pub fn tick_skipped(&self) {
        self.skipped_ticks.increment(1);
    }

    pub fn set_series_length(&self, len: usize) {
        self.series_length.set(len as f64);
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }
}

/// Measures a cycle and records it on drop.
///
/// The outcome defaults to `failed` so an early return is never counted as
/// a success.
pub struct CycleTimer<'a> {
    metrics: &'a SyncMetrics,
    start: Instant,
    outcome: &'static str,
}

impl<'a> CycleTimer<'a> {
    pub fn new(metrics: &'a SyncMetrics) -> Self {
        Self {
            metrics,
            start: Instant::now(),
            outcome: "failed",
        }
    }

    pub fn set_outcome(&mut self, outcome: &'static str) {
        self.outcome = outcome;
    }
}

impl Drop for CycleTimer<'_> {
    fn drop(&mut self) {
        self.metrics.record_cycle(self.outcome, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        let metrics = SyncMetrics::new("XAUUSD");
        metrics.point_appended();
        metrics.set_series_length(50);
        {
            let mut timer = CycleTimer::new(&metrics);
            timer.set_outcome("completed");
        }
        assert_eq!(metrics.instrument(), "XAUUSD");
    }
}
