//! Remote analysis over HTTP
//!
//! POSTs the [`AnalysisRequest`] as JSON and expects an `AnalysisResult`
//! document back. Confidence is clamped to 0-100 and the basis falls back to
//! the locally computed spread when the remote omits it.

use crate::analyzer::{AnalysisRequest, MarketAnalyzer};
use crate::error::{AnalysisError, AnalyzeResult};
use async_trait::async_trait;
use chrono::Utc;
use market_data::{round_to, AnalysisResult, Sentiment, Trend};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP-based analyzer
pub struct HttpAnalyzer {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpAnalyzer {
    pub fn new(endpoint: Url, api_key: Option<String>, timeout: Duration) -> AnalyzeResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Remote(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[async_trait]
impl MarketAnalyzer for HttpAnalyzer {
    fn name(&self) -> &str {
        "http"
    }

    async fn analyze(&self, request: AnalysisRequest) -> AnalyzeResult<AnalysisResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AnalysisError::MissingCredential)?;
        if request.series.is_empty() {
            return Err(AnalysisError::EmptySeries);
        }

        debug!(
            endpoint = %self.endpoint,
            points = request.series.len(),
            "Requesting remote analysis"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Analysis service returned an error status");
            return Err(AnalysisError::Remote(format!("{}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Remote(e.to_string()))?;

        parse_analysis(&body, &request)
    }
}

/// Remote document; every field optional so partial answers can be repaired
#[derive(Debug, Deserialize)]
struct RemoteAnalysis {
    sentiment: Option<Sentiment>,
    confidence: Option<f64>,
    summary: Option<String>,
    reasoning: Option<String>,
    support_band: Option<String>,
    resistance_band: Option<String>,
    basis: Option<f64>,
    oi_trend: Option<Trend>,
    price_trend: Option<Trend>,
    #[serde(default)]
    source_citations: Vec<market_data::Citation>,
}

/// Parse a remote answer, filling the locally computable basis.
///
/// Sentiment and summary are required; a reply without them is malformed.
pub fn parse_analysis(body: &str, request: &AnalysisRequest) -> AnalyzeResult<AnalysisResult> {
    let remote: RemoteAnalysis =
        serde_json::from_str(body).map_err(|e| AnalysisError::Malformed(e.to_string()))?;

    let sentiment = remote
        .sentiment
        .ok_or_else(|| AnalysisError::Malformed("missing sentiment".to_string()))?;
    let summary = remote
        .summary
        .ok_or_else(|| AnalysisError::Malformed("missing summary".to_string()))?;

    let local_basis = request
        .series
        .last()
        .map(|p| round_to(p.basis(), 2))
        .unwrap_or(0.0);

    Ok(AnalysisResult {
        sentiment,
        confidence: remote.confidence.unwrap_or(0.0).clamp(0.0, 100.0).round() as u8,
        summary,
        reasoning: remote.reasoning.unwrap_or_default(),
        support_band: remote.support_band.unwrap_or_else(|| "-".to_string()),
        resistance_band: remote.resistance_band.unwrap_or_else(|| "-".to_string()),
        basis: remote.basis.unwrap_or(local_basis),
        oi_trend: remote.oi_trend.unwrap_or(Trend::Stable),
        price_trend: remote.price_trend.unwrap_or(Trend::Stable),
        source_citations: remote.source_citations,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use market_data::{DataPoint, PointSource};

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            vec![DataPoint {
                timestamp: 1,
                label: String::new(),
                primary_price: 2600.0,
                derived_price: 2603.5,
                open_interest: 1,
                volume: 1,
                source: PointSource::External,
            }],
            None,
        )
    }

    #[test]
    fn test_parse_complete_answer() {
        let body = r#"{
            "sentiment": "BEARISH", "confidence": 140, "summary": "Heavy supply",
            "reasoning": "OI up on red candles", "support_band": "2580 - 2590",
            "resistance_band": "2620 - 2630", "basis": 3.1,
            "oi_trend": "RISING", "price_trend": "FALLING",
            "source_citations": [{"title": "desk note", "uri": "https://example.com"}]
        }"#;

        let result = parse_analysis(body, &request()).unwrap();
        assert_eq!(result.sentiment, Sentiment::Bearish);
        assert_eq!(result.confidence, 100);
        assert_eq!(result.basis, 3.1);
        assert_eq!(result.oi_trend, Trend::Rising);
        assert_eq!(result.source_citations.len(), 1);
    }

    #[test]
    fn test_parse_fills_local_basis() {
        let body = r#"{ "sentiment": "NEUTRAL", "summary": "quiet" }"#;
        let result = parse_analysis(body, &request()).unwrap();

        assert_eq!(result.basis, 3.5);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.price_trend, Trend::Stable);
    }

    #[test]
    fn test_parse_requires_sentiment() {
        assert_matches!(
            parse_analysis(r#"{ "summary": "x" }"#, &request()),
            Err(AnalysisError::Malformed(_))
        );
        assert_matches!(
            parse_analysis("not json", &request()),
            Err(AnalysisError::Malformed(_))
        );
    }

    #[tokio::test]
    async fn test_missing_credential() {
        let analyzer = HttpAnalyzer::new(
            Url::parse("http://127.0.0.1:9/analyze").unwrap(),
            None,
            Duration::from_secs(1),
        )
        .unwrap();

        assert_matches!(
            analyzer.analyze(request()).await,
            Err(AnalysisError::MissingCredential)
        );
    }
}
