//! Analyzer trait and the scripted mock implementation

use crate::error::{AnalysisError, AnalyzeResult};
use async_trait::async_trait;
use chrono::Utc;
use market_data::{AnalysisResult, Citation, DataPoint, OptionSeriesEntry, Sentiment, Trend};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Everything an analysis step sees for one cycle
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    /// Full current series, oldest first
    pub series: Vec<DataPoint>,
    /// Latest point before this cycle's merge
    pub previous: Option<DataPoint>,
    pub citations: Vec<Citation>,
    pub option_series: Vec<OptionSeriesEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
}

impl AnalysisRequest {
    pub fn new(series: Vec<DataPoint>, previous: Option<DataPoint>) -> Self {
        Self {
            series,
            previous,
            citations: Vec::new(),
            option_series: Vec::new(),
            user_prompt: None,
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn with_option_series(mut self, option_series: Vec<OptionSeriesEntry>) -> Self {
        self.option_series = option_series;
        self
    }

    pub fn with_user_prompt(mut self, prompt: Option<String>) -> Self {
        self.user_prompt = prompt;
        self
    }
}

/// Client trait for the analysis step - protocol agnostic
#[async_trait]
pub trait MarketAnalyzer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Analyze the request's series.
    ///
    /// Errors are reported as values; the sequencer turns them into a
    /// neutral fallback result.
    async fn analyze(&self, request: AnalysisRequest) -> AnalyzeResult<AnalysisResult>;
}

// ==================== Mock Implementation ====================

/// Scripted analyzer for tests.
///
/// Queued outcomes are returned in order, then a neutral default.
pub struct MockAnalyzer {
    outcomes: Mutex<VecDeque<AnalyzeResult<AnalysisResult>>>,
    last_request: Mutex<Option<AnalysisRequest>>,
    delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            last_request: Mutex::new(None),
            delay: None,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_sentiment(self, sentiment: Sentiment, confidence: u8) -> Self {
        self.outcomes
            .lock()
            .push_back(Ok(canned(sentiment, confidence)));
        self
    }

    pub fn with_error(self, error: AnalysisError) -> Self {
        self.outcomes.lock().push_back(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block each call until `gate` is notified
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request seen
    pub fn last_request(&self) -> Option<AnalysisRequest> {
        self.last_request.lock().clone()
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketAnalyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, request: AnalysisRequest) -> AnalyzeResult<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.outcomes.lock().pop_front();
        next.unwrap_or_else(|| Ok(canned(Sentiment::Neutral, 50)))
    }
}

fn canned(sentiment: Sentiment, confidence: u8) -> AnalysisResult {
    AnalysisResult {
        sentiment,
        confidence: confidence.min(100),
        summary: "mock analysis".to_string(),
        reasoning: String::new(),
        support_band: "-".to_string(),
        resistance_band: "-".to_string(),
        basis: 0.0,
        oi_trend: Trend::Stable,
        price_trend: Trend::Stable,
        source_citations: Vec::new(),
        generated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_mock_records_request_and_replays_outcomes() {
        let analyzer = MockAnalyzer::new()
            .with_sentiment(Sentiment::Bullish, 80)
            .with_error(AnalysisError::Remote("boom".to_string()));

        let request = AnalysisRequest::new(Vec::new(), None)
            .with_user_prompt(Some("focus on basis".to_string()));

        let first = analyzer.analyze(request.clone()).await.unwrap();
        assert_eq!(first.sentiment, Sentiment::Bullish);
        assert_eq!(first.confidence, 80);

        assert_matches!(
            analyzer.analyze(request.clone()).await,
            Err(AnalysisError::Remote(_))
        );

        let third = analyzer.analyze(request).await.unwrap();
        assert_eq!(third.sentiment, Sentiment::Neutral);

        assert_eq!(analyzer.calls(), 3);
        assert_eq!(
            analyzer.last_request().and_then(|r| r.user_prompt),
            Some("focus on basis".to_string())
        );
    }
}
