//! Local price / open interest analysis
//!
//! Classic open interest reading over the series window:
//!
//! | price   | open interest | reading          | sentiment |
//! |---------|---------------|------------------|-----------|
//! | rising  | rising        | new longs        | bullish   |
//! | falling | rising        | new shorts       | bearish   |
//! | rising  | falling       | short covering   | bullish (weak) |
//! | falling | falling       | long liquidation | bearish (weak) |
//!
//! Anything with a stable leg is neutral.

use crate::analyzer::{AnalysisRequest, MarketAnalyzer};
use crate::error::{AnalysisError, AnalyzeResult};
use async_trait::async_trait;
use chrono::Utc;
use market_data::{round_to, AnalysisResult, DataPoint, Sentiment, Trend};
use tracing::debug;

pub const DEFAULT_TREND_THRESHOLD_PERCENT: f64 = 0.1;

/// Share of the window's range used for the support and resistance bands
const BAND_FRACTION: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    trend_threshold_percent: f64,
}

impl HeuristicAnalyzer {
    pub fn new(trend_threshold_percent: f64) -> Self {
        Self {
            trend_threshold_percent: trend_threshold_percent.abs(),
        }
    }

    pub fn evaluate(&self, request: &AnalysisRequest) -> AnalyzeResult<AnalysisResult> {
        let series = &request.series;
        let (Some(first), Some(latest)) = (series.first(), series.last()) else {
            return Err(AnalysisError::EmptySeries);
        };

        let price_change = percent_change(first.primary_price, latest.primary_price);
        let oi_change = percent_change(first.open_interest as f64, latest.open_interest as f64);
        let price_trend = self.classify(price_change);
        let oi_trend = self.classify(oi_change);

        let (sentiment, base, reading) = match (price_trend, oi_trend) {
            (Trend::Rising, Trend::Rising) => (Sentiment::Bullish, 65, "new long positions"),
            (Trend::Falling, Trend::Rising) => (Sentiment::Bearish, 65, "new short positions"),
            (Trend::Rising, Trend::Falling) => (Sentiment::Bullish, 45, "short covering"),
            (Trend::Falling, Trend::Falling) => (Sentiment::Bearish, 45, "long liquidation"),
            _ => (Sentiment::Neutral, 30, "no directional commitment"),
        };
        let strength = (price_change.abs() * 10.0).min(25.0) as u8;
        let confidence = if sentiment == Sentiment::Neutral {
            base
        } else {
            (base + strength).min(95)
        };

        let basis = round_to(latest.basis(), 2);
        let (support_band, resistance_band) = bands(series);

        let tick = request
            .previous
            .as_ref()
            .map(|p| latest.primary_price - p.primary_price)
            .unwrap_or(0.0);

        let mut reasoning = format!(
            "Spot {} {:.2}% over the window while open interest {} {:.2}%, pointing to {}. \
             Last tick {:+.2}. Basis {:.2} ({}).",
            verb(price_trend),
            price_change,
            verb(oi_trend),
            oi_change,
            reading,
            tick,
            basis,
            if basis >= 0.0 { "contango" } else { "backwardation" },
        );
        if let Some(ratio) = put_call_ratio(request) {
            reasoning.push_str(&format!(" Option put/call OI ratio {:.2}.", ratio));
        }

        debug!(?sentiment, confidence, price_change, oi_change, "Heuristic analysis");

        Ok(AnalysisResult {
            sentiment,
            confidence,
            summary: format!("{:?} bias: {}", sentiment, reading),
            reasoning,
            support_band,
            resistance_band,
            basis,
            oi_trend,
            price_trend,
            source_citations: Vec::new(),
            generated_at: Utc::now(),
        })
    }

    fn classify(&self, change_percent: f64) -> Trend {
        if change_percent > self.trend_threshold_percent {
            Trend::Rising
        } else if change_percent < -self.trend_threshold_percent {
            Trend::Falling
        } else {
            Trend::Stable
        }
    }
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_THRESHOLD_PERCENT)
    }
}

#[async_trait]
impl MarketAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn analyze(&self, request: AnalysisRequest) -> AnalyzeResult<AnalysisResult> {
        self.evaluate(&request)
    }
}

fn percent_change(from: f64, to: f64) -> f64 {
    if from == 0.0 {
        return 0.0;
    }
    (to - from) / from * 100.0
}

fn verb(trend: Trend) -> &'static str {
    match trend {
        Trend::Rising => "rose",
        Trend::Falling => "fell",
        Trend::Stable => "held",
    }
}

fn bands(series: &[DataPoint]) -> (String, String) {
    let (low, high) = series
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| {
            (lo.min(p.primary_price), hi.max(p.primary_price))
        });
    let width = (high - low) * BAND_FRACTION;

    (
        format!("{:.2} - {:.2}", low, low + width),
        format!("{:.2} - {:.2}", high - width, high),
    )
}

fn put_call_ratio(request: &AnalysisRequest) -> Option<f64> {
    let (calls, puts) = request
        .option_series
        .iter()
        .fold((0u64, 0u64), |(c, p), e| {
            (c + e.call_open_interest, p + e.put_open_interest)
        });
    if calls == 0 {
        return None;
    }
    Some(puts as f64 / calls as f64)
}
