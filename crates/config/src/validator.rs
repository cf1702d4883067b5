use crate::*;
use thiserror::Error;
use url::Url;

/// Open interest and volume stay within signed 64-bit arithmetic
pub const MAX_SIMULATED_QUANTITY: u64 = i64::MAX as u64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Instrument label is required")]
    MissingInstrument,

    #[error("series.capacity must be at least 2, got {0}")]
    InvalidCapacity(usize),

    #[error("series.price_decimals must be at most 8, got {0}")]
    InvalidPriceDecimals(u32),

    #[error("{field} must be a positive number")]
    InvalidPositiveFloat { field: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("{field} must be at most {max}, got {value}")]
    ValueTooLarge { field: String, value: u64, max: u64 },

    #[error("simulator.premium_min ({min}) must not exceed simulator.premium_max ({max})")]
    InvalidPremiumRange { min: f64, max: f64 },

    #[error("{field}: invalid URL '{value}': {message}")]
    InvalidUrl {
        field: String,
        value: String,
        message: String,
    },

    #[error("analysis.endpoint is required when provider is http")]
    MissingAnalysisEndpoint,

    #[error("feed.endpoint is required in external mode")]
    MissingFeedEndpoint,

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

pub fn validate_config(config: &MarketSyncConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_app(&config.app, &mut report);
    validate_series(&config.series, &mut report);
    validate_simulator(&config.simulator, &mut report);
    validate_refresh(&config.refresh, &mut report);
    validate_feed(config, &mut report);
    validate_analysis(&config.analysis, &mut report);
    validate_monitoring(&config.monitoring, &mut report);

    report
}

fn validate_app(app: &AppConfig, report: &mut ValidationReport) {
    if app.instrument.trim().is_empty() {
        report.add_error(ValidationError::MissingInstrument);
    }
}

fn validate_series(series: &SeriesConfig, report: &mut ValidationReport) {
    if series.capacity < 2 {
        report.add_error(ValidationError::InvalidCapacity(series.capacity));
    }
    if series.price_decimals > 8 {
        report.add_error(ValidationError::InvalidPriceDecimals(series.price_decimals));
    }
    if series.bootstrap_spacing_minutes == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "series.bootstrap_spacing_minutes".to_string(),
        });
    }
}

fn validate_simulator(sim: &SimulatorConfig, report: &mut ValidationReport) {
    for (field, value) in [
        ("simulator.seed_price", sim.seed_price),
        ("simulator.max_step", sim.max_step),
        ("simulator.premium_min", sim.premium_min),
        ("simulator.premium_max", sim.premium_max),
        ("simulator.strong_move", sim.strong_move),
    ] {
        if !(value.is_finite() && value > 0.0) {
            report.add_error(ValidationError::InvalidPositiveFloat {
                field: field.to_string(),
            });
        }
    }

    if sim.premium_min > sim.premium_max {
        report.add_error(ValidationError::InvalidPremiumRange {
            min: sim.premium_min,
            max: sim.premium_max,
        });
    }

    for (field, value) in [
        ("simulator.seed_open_interest", sim.seed_open_interest),
        ("simulator.tick_interval_ms", sim.tick_interval_ms),
    ] {
        if value == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: field.to_string(),
            });
        }
    }

    for (field, value) in [
        ("simulator.seed_open_interest", sim.seed_open_interest),
        ("simulator.oi_step", sim.oi_step),
        ("simulator.volume_max", sim.volume_max),
    ] {
        if value > MAX_SIMULATED_QUANTITY {
            report.add_error(ValidationError::ValueTooLarge {
                field: field.to_string(),
                value,
                max: MAX_SIMULATED_QUANTITY,
            });
        }
    }

    if sim.max_step > sim.seed_price / 10.0 {
        report.add_warning(
            "simulator.max_step",
            "Step is more than 10% of the seed price; the walk may go negative",
        );
    }
}

fn validate_refresh(refresh: &RefreshConfig, report: &mut ValidationReport) {
    if refresh.interval_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "refresh.interval_seconds".to_string(),
        });
    }
}

fn validate_feed(config: &MarketSyncConfig, report: &mut ValidationReport) {
    let feed = &config.feed;

    match feed.endpoint.as_deref() {
        Some(endpoint) => validate_url("feed.endpoint", endpoint, report),
        None if config.app.mode == AppMode::External => {
            report.add_error(ValidationError::MissingFeedEndpoint);
        }
        None => {}
    }

    if feed.timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "feed.timeout_seconds".to_string(),
        });
    }

    if feed.endpoint.is_some() {
        validate_api_key("feed.api_key", feed.api_key.as_deref(), report);
    }
}

fn validate_analysis(analysis: &AnalysisConfig, report: &mut ValidationReport) {
    if analysis.provider == AnalysisProvider::Http {
        match analysis.endpoint.as_deref() {
            Some(endpoint) => validate_url("analysis.endpoint", endpoint, report),
            None => report.add_error(ValidationError::MissingAnalysisEndpoint),
        }
        validate_api_key("analysis.api_key", analysis.api_key.as_deref(), report);
    }

    if analysis.timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "analysis.timeout_seconds".to_string(),
        });
    }

    if !(analysis.trend_threshold_percent.is_finite() && analysis.trend_threshold_percent >= 0.0) {
        report.add_error(ValidationError::InvalidPositiveFloat {
            field: "analysis.trend_threshold_percent".to_string(),
        });
    }
}

fn validate_monitoring(monitoring: &MonitoringConfig, report: &mut ValidationReport) {
    let valid_formats = ["pretty", "json", "compact"];
    if !valid_formats.contains(&monitoring.log_format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(monitoring.log_format.clone()));
    }
}

fn validate_url(field: &str, value: &str, report: &mut ValidationReport) {
    if has_unresolved_env_vars(value) {
        report.add_warning(field, "Unresolved environment variable placeholder");
        return;
    }

    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => report.add_error(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => report.add_error(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
            message: e.to_string(),
        }),
    }
}

fn validate_api_key(field: &str, value: Option<&str>, report: &mut ValidationReport) {
    match value.map(str::trim) {
        None | Some("") => report.add_warning(field, "No API key configured; requests will fail"),
        Some(key) if has_unresolved_env_vars(key) => {
            report.add_warning(field, "Unresolved environment variable placeholder")
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let report = validate_config(&MarketSyncConfig::default());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_oversized_oi_step_rejected() {
        let mut config = MarketSyncConfig::default();
        config.simulator.oi_step = u64::MAX;

        let report = validate_config(&config);
        assert_eq!(
            report.errors,
            vec![ValidationError::ValueTooLarge {
                field: "simulator.oi_step".to_string(),
                value: u64::MAX,
                max: MAX_SIMULATED_QUANTITY,
            }]
        );
    }

    #[test]
    fn test_simulator_errors() {
        let mut config = MarketSyncConfig::default();
        config.series.capacity = 1;
        config.simulator.premium_min = 4.0;
        config.simulator.max_step = 0.0;
        config.refresh.interval_seconds = 0;

        let report = validate_config(&config);
        assert!(report.errors.contains(&ValidationError::InvalidCapacity(1)));
        assert!(report
            .errors
            .contains(&ValidationError::InvalidPremiumRange { min: 4.0, max: 3.0 }));
        assert!(report.errors.contains(&ValidationError::InvalidPositiveFloat {
            field: "simulator.max_step".to_string()
        }));
        assert!(report.errors.contains(&ValidationError::InvalidPositiveInteger {
            field: "refresh.interval_seconds".to_string()
        }));
    }

    #[test]
    fn test_external_mode_requires_feed_endpoint() {
        let mut config = MarketSyncConfig::default();
        config.app.mode = AppMode::External;

        let report = validate_config(&config);
        assert_eq!(report.errors, vec![ValidationError::MissingFeedEndpoint]);
    }

    #[test]
    fn test_bad_urls_and_missing_keys() {
        let mut config = MarketSyncConfig::default();
        config.feed.endpoint = Some("ftp://quotes".to_string());
        config.analysis.provider = AnalysisProvider::Http;

        let report = validate_config(&config);
        assert!(report.errors.iter().any(
            |e| matches!(e, ValidationError::InvalidUrl { field, .. } if field == "feed.endpoint")
        ));
        assert!(report.errors.contains(&ValidationError::MissingAnalysisEndpoint));
        assert!(report.warnings.iter().any(|w| w.field == "feed.api_key"));
        assert!(report.warnings.iter().any(|w| w.field == "analysis.api_key"));
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = MarketSyncConfig::default();
        config.monitoring.log_format = "xml".to_string();

        let report = validate_config(&config);
        assert_eq!(
            report.errors,
            vec![ValidationError::InvalidLogFormat("xml".to_string())]
        );
    }
}
