use serde::{Deserialize, Serialize};
use std::fmt;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Root of `marketsync.yaml`.
///
/// Every section may be omitted; missing sections take their defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MarketSyncConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub series: SeriesConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Instrument label used in logs and metrics
    #[serde(default = "default_instrument")]
    pub instrument: String,
    #[serde(default)]
    pub mode: AppMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            instrument: default_instrument(),
            mode: AppMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    #[default]
    Simulated,
    External,
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppMode::Simulated => write!(f, "simulated"),
            AppMode::External => write!(f, "external"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeriesConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Spacing of the bootstrapped history
    #[serde(default = "default_bootstrap_spacing_minutes")]
    pub bootstrap_spacing_minutes: u64,
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            bootstrap_spacing_minutes: default_bootstrap_spacing_minutes(),
            price_decimals: default_price_decimals(),
        }
    }
}

/// Random walk parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_seed_price")]
    pub seed_price: f64,
    #[serde(default = "default_seed_open_interest")]
    pub seed_open_interest: u64,
    /// Largest absolute price move per step
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    #[serde(default = "default_premium_min")]
    pub premium_min: f64,
    #[serde(default = "default_premium_max")]
    pub premium_max: f64,
    /// Price move beyond which open interest is biased with the move
    #[serde(default = "default_strong_move")]
    pub strong_move: f64,
    #[serde(default = "default_oi_step")]
    pub oi_step: u64,
    #[serde(default = "default_volume_max")]
    pub volume_max: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Fixed seed for reproducible runs
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed_price: default_seed_price(),
            seed_open_interest: default_seed_open_interest(),
            max_step: default_max_step(),
            premium_min: default_premium_min(),
            premium_max: default_premium_max(),
            strong_move: default_strong_move(),
            oi_step: default_oi_step(),
            volume_max: default_volume_max(),
            tick_interval_ms: default_tick_interval_ms(),
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_enabled")]
    pub auto_refresh: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_refresh_interval(),
            auto_refresh: default_enabled(),
        }
    }
}

/// External quote source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_feed_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_seconds: default_feed_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub provider: AnalysisProvider,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_seconds: u64,
    /// Free-form instruction forwarded with every request
    #[serde(default)]
    pub user_prompt: Option<String>,
    #[serde(default = "default_trend_threshold_percent")]
    pub trend_threshold_percent: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: AnalysisProvider::default(),
            endpoint: None,
            api_key: None,
            timeout_seconds: default_analysis_timeout(),
            user_prompt: None,
            trend_threshold_percent: default_trend_threshold_percent(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisProvider {
    #[default]
    Heuristic,
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus listener; disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}
