use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Sections that may be left out of the file
const SECTIONS: [&str; 7] = [
    "app",
    "series",
    "simulator",
    "refresh",
    "feed",
    "analysis",
    "monitoring",
];

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MarketSyncConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());
    parse_config(&content)
}

/// Substitute environment variables and parse YAML
pub fn parse_config(content: &str) -> Result<MarketSyncConfig> {
    let substituted = substitution::substitute_env_vars(content)?;

    // An empty document means "all defaults"
    if substituted.trim().is_empty() {
        return Ok(MarketSyncConfig::default());
    }

    let config: MarketSyncConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!(
        mode = %config.app.mode,
        instrument = %config.app.instrument,
        "Configuration loaded successfully"
    );
    Ok(config)
}

/// Load, validate and report which sections fell back to defaults
pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<(MarketSyncConfig, ValidationReport)> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)?;
    let mut report = validate_config(&config);

    let document: serde_yaml::Value =
        serde_yaml::from_str(&content).unwrap_or(serde_yaml::Value::Null);
    for section in SECTIONS {
        if document.get(section).is_none() {
            report.add_default(section, "defaults");
        }
    }

    Ok((config, report))
}

#[instrument]
pub fn generate_default_config() -> MarketSyncConfig {
    MarketSyncConfig {
        feed: FeedConfig {
            endpoint: Some("https://quotes.example.com/v1/xauusd".to_string()),
            api_key: Some("${MARKETSYNC_FEED_KEY}".to_string()),
            ..FeedConfig::default()
        },
        analysis: AnalysisConfig {
            user_prompt: Some("Focus on open interest and the futures basis.".to_string()),
            ..AnalysisConfig::default()
        },
        ..MarketSyncConfig::default()
    }
}

#[instrument(skip(config))]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(
    config: &MarketSyncConfig,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
