//! Shared types for the market series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which strategy produced a data point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    #[default]
    Simulated,
    External,
}

/// One observation of the instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Display label (HH:MM, UTC)
    pub label: String,
    /// Spot price of the underlying
    pub primary_price: f64,
    /// Derivative (futures) price
    pub derived_price: f64,
    pub open_interest: u64,
    pub volume: u64,
    #[serde(default)]
    pub source: PointSource,
}

impl DataPoint {
    /// Derived price minus primary price
    pub fn basis(&self) -> f64 {
        self.derived_price - self.primary_price
    }

    /// Build the display label for an epoch-millisecond timestamp
    pub fn label_for(timestamp: i64) -> String {
        DateTime::<Utc>::from_timestamp_millis(timestamp)
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default()
    }

    /// Move the point just after `tail` if it is not already later.
    ///
    /// Returns whether the timestamp changed.
    pub fn stamp_after(&mut self, tail: i64) -> bool {
        if self.timestamp > tail {
            return false;
        }
        self.timestamp = tail + 1;
        self.label = Self::label_for(self.timestamp);
        true
    }
}

/// Option expiry family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeriesKind {
    Monthly,
    Weekly,
    Daily,
}

/// Open interest of one option expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSeriesEntry {
    pub expiry_label: String,
    #[serde(default)]
    pub code: Option<String>,
    pub call_open_interest: u64,
    pub put_open_interest: u64,
    pub series_kind: SeriesKind,
}

impl OptionSeriesEntry {
    /// Put OI over call OI, `None` when there is no call interest
    pub fn put_call_ratio(&self) -> Option<f64> {
        if self.call_open_interest == 0 {
            return None;
        }
        Some(self.put_open_interest as f64 / self.call_open_interest as f64)
    }
}

/// A source cited by the fetch or analysis step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

/// Output of one analysis step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sentiment: Sentiment,
    /// 0-100
    pub confidence: u8,
    pub summary: String,
    pub reasoning: String,
    pub support_band: String,
    pub resistance_band: String,
    pub basis: f64,
    pub oi_trend: Trend,
    pub price_trend: Trend,
    #[serde(default)]
    pub source_citations: Vec<Citation>,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Neutral, zero-confidence result used when a cycle fails.
    ///
    /// The basis is computed from the latest point of `series`, so the
    /// spread stays visible even when the remote steps are unavailable.
    pub fn fallback(series: &[DataPoint], message: impl Into<String>) -> Self {
        let basis = series.last().map(|p| round_to(p.basis(), 2)).unwrap_or(0.0);
        Self {
            sentiment: Sentiment::Neutral,
            confidence: 0,
            summary: "Analysis unavailable".to_string(),
            reasoning: message.into(),
            support_band: "-".to_string(),
            resistance_band: "-".to_string(),
            basis,
            oi_trend: Trend::Stable,
            price_trend: Trend::Stable,
            source_citations: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Copy of this result with `citations` attached
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.source_citations = citations;
        self
    }
}

/// Status of the most recent refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Refresh state shown alongside the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCycleState {
    pub status: CycleStatus,
    pub countdown_seconds: u64,
    pub auto_refresh_enabled: bool,
}

/// Round `value` to `decimals` places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(primary: f64, derived: f64) -> DataPoint {
        DataPoint {
            timestamp: 0,
            label: "00:00".to_string(),
            primary_price: primary,
            derived_price: derived,
            open_interest: 1,
            volume: 1,
            source: PointSource::Simulated,
        }
    }

    #[test]
    fn test_basis() {
        assert!((point(2350.0, 2352.5).basis() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_label_for() {
        // 1970-01-01 01:30 UTC
        assert_eq!(DataPoint::label_for(90 * 60 * 1000), "01:30");
    }

    #[test]
    fn test_stamp_after() {
        let mut p = point(1.0, 1.0);
        assert!(p.stamp_after(90 * 60 * 1000));
        assert_eq!(p.timestamp, 90 * 60 * 1000 + 1);
        assert_eq!(p.label, "01:30");

        assert!(!p.stamp_after(0));
        assert_eq!(p.timestamp, 90 * 60 * 1000 + 1);
    }

    #[test]
    fn test_fallback_is_neutral_with_local_basis() {
        let series = vec![point(100.0, 101.0), point(2350.0, 2353.26)];
        let result = AnalysisResult::fallback(&series, "feed down");

        assert_eq!(result.sentiment, Sentiment::Neutral);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.reasoning, "feed down");
        assert!((result.basis - 3.26).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_on_empty_series() {
        let result = AnalysisResult::fallback(&[], "nothing");
        assert_eq!(result.basis, 0.0);
    }

    #[test]
    fn test_put_call_ratio() {
        let entry = OptionSeriesEntry {
            expiry_label: "DEC".to_string(),
            code: None,
            call_open_interest: 200,
            put_open_interest: 100,
            series_kind: SeriesKind::Monthly,
        };
        assert_eq!(entry.put_call_ratio(), Some(0.5));

        let empty = OptionSeriesEntry {
            call_open_interest: 0,
            ..entry
        };
        assert_eq!(empty.put_call_ratio(), None);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&Sentiment::Bullish).unwrap(), "\"BULLISH\"");
        assert_eq!(serde_json::to_string(&SeriesKind::Weekly).unwrap(), "\"WEEKLY\"");
        assert_eq!(serde_json::to_string(&CycleStatus::Loading).unwrap(), "\"loading\"");
    }
}
