//! HTTP snapshot source
//!
//! Reads a JSON quote document from a configured endpoint:
//!
//! ```json
//! {
//!   "spot_price": 2601.3,
//!   "futures_price": "2,604.10",
//!   "open_interest": 452000,
//!   "volume": 1200,
//!   "timestamp": 1700000000000,
//!   "option_series": [
//!     { "expiry_label": "DEC", "code": "AU2412", "call_open_interest": 1200,
//!       "put_open_interest": 800, "series_kind": "MONTHLY" }
//!   ],
//!   "citations": [ { "title": "Exchange quote", "uri": "https://..." } ]
//! }
//! ```
//!
//! Numeric fields may be JSON numbers or strings with thousands separators.

use crate::error::{FetchError, FetchResult};
use crate::source::{ExternalSnapshot, SnapshotSource};
use async_trait::async_trait;
use chrono::Utc;
use market_data::{Citation, DataPoint, OptionSeriesEntry, PointSource};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP-based snapshot source
pub struct HttpSnapshotSource {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpSnapshotSource {
    pub fn new(endpoint: Url, api_key: Option<String>, timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_snapshot(&self) -> FetchResult<ExternalSnapshot> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingCredential)?;

        debug!(endpoint = %self.endpoint, "Fetching market snapshot");

        let response = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::InvalidCredential(status.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Market feed returned an error status");
            return Err(FetchError::Transport(format!("{}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let document: Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Unparsable(e.to_string()))?;

        parse_snapshot(&document, Utc::now().timestamp_millis())
    }
}

/// Turn a quote document into a snapshot.
///
/// `now_ms` stamps documents that carry no timestamp of their own.
pub fn parse_snapshot(document: &Value, now_ms: i64) -> FetchResult<ExternalSnapshot> {
    if !document.is_object() {
        return Err(FetchError::Unparsable(
            "expected a JSON object".to_string(),
        ));
    }

    let spot = number(document, "spot_price").filter(|v| *v > 0.0);
    let futures = number(document, "futures_price").filter(|v| *v > 0.0);
    let open_interest = number(document, "open_interest").filter(|v| *v >= 0.0);

    let mut missing = Vec::new();
    if spot.is_none() {
        missing.push("spot_price".to_string());
    }
    if futures.is_none() {
        missing.push("futures_price".to_string());
    }
    if open_interest.is_none() {
        missing.push("open_interest".to_string());
    }
    let (Some(spot), Some(futures), Some(open_interest)) = (spot, futures, open_interest) else {
        return Err(FetchError::InsufficientData(missing));
    };

    let volume = number(document, "volume").unwrap_or(0.0).max(0.0);
    let timestamp = number(document, "timestamp")
        .map(|t| t as i64)
        .filter(|t| *t > 0)
        .unwrap_or(now_ms);

    let option_series: Vec<OptionSeriesEntry> = match document.get("option_series") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|e| match serde_json::from_value(e.clone()) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!(%err, "Skipping malformed option series entry");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    let citations: Vec<Citation> = match document.get("citations") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|e| serde_json::from_value(e.clone()).ok())
            .collect(),
        _ => Vec::new(),
    };

    Ok(ExternalSnapshot {
        data_point: DataPoint {
            timestamp,
            label: DataPoint::label_for(timestamp),
            primary_price: spot,
            derived_price: futures,
            open_interest: open_interest.round() as u64,
            volume: volume.round() as u64,
            source: PointSource::External,
        },
        option_series,
        citations,
    })
}

/// Read a number that may be encoded as a string like "2,604.10"
fn number(document: &Value, field: &str) -> Option<f64> {
    let value = match document.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}
