pub const DEFAULT_CONFIG_PATH: &str = "config/marketsync.yaml";

pub fn default_enabled() -> bool {
    true
}

pub fn default_app_name() -> String {
    "MarketSync".to_string()
}

pub fn default_instrument() -> String {
    "XAUUSD".to_string()
}

pub fn default_capacity() -> usize {
    50
}

pub fn default_bootstrap_spacing_minutes() -> u64 {
    15
}

pub fn default_price_decimals() -> u32 {
    2
}

pub fn default_seed_price() -> f64 {
    2350.0
}

pub fn default_seed_open_interest() -> u64 {
    450_000
}

pub fn default_max_step() -> f64 {
    2.5
}

pub fn default_premium_min() -> f64 {
    0.5
}

pub fn default_premium_max() -> f64 {
    3.0
}

pub fn default_strong_move() -> f64 {
    1.0
}

pub fn default_oi_step() -> u64 {
    1200
}

pub fn default_volume_max() -> u64 {
    5000
}

pub fn default_tick_interval_ms() -> u64 {
    3000
}

pub fn default_refresh_interval() -> u64 {
    60
}

pub fn default_feed_timeout() -> u64 {
    15
}

pub fn default_analysis_timeout() -> u64 {
    30
}

pub fn default_trend_threshold_percent() -> f64 {
    0.1
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}
