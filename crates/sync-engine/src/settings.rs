//! Engine settings and collaborator wiring from configuration

use crate::error::{EngineError, EngineResult};
use analysis::{HeuristicAnalyzer, HttpAnalyzer, MarketAnalyzer};
use config::{
    AnalysisConfig, AnalysisProvider, FeedConfig, MarketSyncConfig, SeriesConfig, SimulatorConfig,
};
use feed::{HttpSnapshotSource, SnapshotSource, UnconfiguredSource};
use market_data::{GeneratorParams, SeriesGenerator};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub instrument: String,
    pub capacity: usize,
    pub price_decimals: u32,
    pub refresh_interval: Duration,
    /// Period of the simulated-mode ticker
    pub simulation_interval: Duration,
    pub auto_refresh: bool,
    pub user_prompt: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&MarketSyncConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &MarketSyncConfig) -> Self {
        Self {
            instrument: config.app.instrument.clone(),
            capacity: config.series.capacity,
            price_decimals: config.series.price_decimals,
            refresh_interval: Duration::from_secs(config.refresh.interval_seconds),
            simulation_interval: Duration::from_millis(config.simulator.tick_interval_ms),
            auto_refresh: config.refresh.auto_refresh,
            user_prompt: config.analysis.user_prompt.clone(),
        }
    }
}

pub fn generator_params(simulator: &SimulatorConfig, series: &SeriesConfig) -> GeneratorParams {
    GeneratorParams {
        seed_price: simulator.seed_price,
        seed_open_interest: simulator.seed_open_interest,
        max_step: simulator.max_step,
        premium_min: simulator.premium_min,
        premium_max: simulator.premium_max,
        strong_move: simulator.strong_move,
        oi_step: simulator.oi_step,
        volume_max: simulator.volume_max,
        bootstrap_spacing_ms: (series.bootstrap_spacing_minutes as i64).saturating_mul(60_000),
        price_decimals: series.price_decimals,
    }
}

/// Seeded when `rng_seed` is set, otherwise from OS entropy
pub fn build_generator(config: &MarketSyncConfig) -> SeriesGenerator {
    let params = generator_params(&config.simulator, &config.series);
    match config.simulator.rng_seed {
        Some(seed) => SeriesGenerator::with_seed(params, seed),
        None => SeriesGenerator::new(params),
    }
}

/// Without an endpoint every fetch fails with `NotConfigured`
pub fn build_source(feed: &FeedConfig) -> EngineResult<Arc<dyn SnapshotSource>> {
    let Some(endpoint) = feed.endpoint.as_deref() else {
        info!("No feed endpoint configured; external mode will report errors");
        return Ok(Arc::new(UnconfiguredSource::new("feed.endpoint is not set")));
    };

    let url = parse_url("feed.endpoint", endpoint)?;
    let source = HttpSnapshotSource::new(
        url,
        feed.api_key.clone(),
        Duration::from_secs(feed.timeout_seconds),
    )?;
    Ok(Arc::new(source))
}

pub fn build_analyzer(analysis: &AnalysisConfig) -> EngineResult<Arc<dyn MarketAnalyzer>> {
    match analysis.provider {
        AnalysisProvider::Heuristic => Ok(Arc::new(HeuristicAnalyzer::new(
            analysis.trend_threshold_percent,
        ))),
        AnalysisProvider::Http => {
            let endpoint = analysis.endpoint.as_deref().ok_or_else(|| EngineError::InvalidUrl {
                field: "analysis.endpoint".to_string(),
                message: "required for the http provider".to_string(),
            })?;
            let analyzer = HttpAnalyzer::new(
                parse_url("analysis.endpoint", endpoint)?,
                analysis.api_key.clone(),
                Duration::from_secs(analysis.timeout_seconds),
            )?;
            Ok(Arc::new(analyzer))
        }
    }
}

fn parse_url(field: &str, value: &str) -> EngineResult<Url> {
    Url::parse(value).map_err(|e| EngineError::InvalidUrl {
        field: field.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_settings_from_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.capacity, 50);
        assert_eq!(settings.refresh_interval, Duration::from_secs(60));
        assert_eq!(settings.simulation_interval, Duration::from_millis(3000));
        assert!(settings.auto_refresh);
    }

    #[test]
    fn test_generator_params_spacing() {
        let config = MarketSyncConfig::default();
        let params = generator_params(&config.simulator, &config.series);
        assert_eq!(params.bootstrap_spacing_ms, 15 * 60 * 1000);
        assert_eq!(params.seed_price, 2350.0);
    }

    #[tokio::test]
    async fn test_missing_feed_endpoint_builds_unconfigured_source() {
        let source = build_source(&FeedConfig::default()).unwrap();
        assert_eq!(source.name(), "unconfigured");
        assert_matches!(
            source.fetch_snapshot().await,
            Err(feed::FetchError::NotConfigured(_))
        );
    }

    #[test]
    fn test_http_analyzer_requires_endpoint() {
        let config = AnalysisConfig {
            provider: AnalysisProvider::Http,
            ..AnalysisConfig::default()
        };
        assert_matches!(
            build_analyzer(&config).err(),
            Some(EngineError::InvalidUrl { .. })
        );

        let heuristic = build_analyzer(&AnalysisConfig::default()).unwrap();
        assert_eq!(heuristic.name(), "heuristic");
    }
}
