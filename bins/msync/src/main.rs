//! MarketSync CLI binary
//!
//! Commands for initializing and validating configuration, printing a
//! simulated series, and running the engine with a small stdin console.

use anyhow::{Context, Result};
use cli::{Cli, Commands, ConsoleCommand, ModeArg};
use config::{
    generate_default_config, load_and_validate, load_config, save_config, validate_config,
    AppMode, MarketSyncConfig, ValidationReport,
};
use market_data::SeriesGenerator;
use observability::{init_logging, init_metrics, LogFormat, SyncMetrics};
use std::path::{Path, PathBuf};
use sync_engine::{generator_params, AppSnapshot, ModeController, ShutdownController};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Points shown by the `s` console command
const SNAPSHOT_TAIL: usize = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { log_format, command } = Cli::parse_args();

    match command {
        Commands::Run {
            mode,
            config,
            interval,
            no_auto_refresh,
        } => run_command(config, mode, interval, no_auto_refresh, log_format).await,
        Commands::Validate { config } => {
            init_logging("msync", resolve_format(log_format.as_deref(), "compact"), "warn")?;
            validate_command(config)
        }
        Commands::Init { output } => {
            init_logging("msync", resolve_format(log_format.as_deref(), "compact"), "warn")?;
            init_command(output)
        }
        Commands::Simulate {
            points,
            seed,
            config,
        } => {
            init_logging("msync", resolve_format(log_format.as_deref(), "compact"), "warn")?;
            simulate_command(points, seed, config)
        }
    }
}

/// CLI flag first, then the configured format, then pretty
fn resolve_format(cli: Option<&str>, configured: &str) -> LogFormat {
    cli.and_then(LogFormat::parse)
        .or_else(|| LogFormat::parse(configured))
        .unwrap_or_default()
}

async fn run_command(
    config_path: PathBuf,
    mode: Option<ModeArg>,
    interval: Option<u64>,
    no_auto_refresh: bool,
    log_format: Option<String>,
) -> Result<()> {
    let (config, report) =
        prepare_run_config(load_config(&config_path)?, mode, interval, no_auto_refresh);

    init_logging(
        &config.app.name,
        resolve_format(log_format.as_deref(), &config.monitoring.log_format),
        &config.monitoring.log_level,
    )?;
    info!(path = ?config_path, "Configuration loaded");

    if config.app.mode == AppMode::External && config.feed.endpoint.is_none() {
        warn!("No feed endpoint configured; external cycles will report errors");
    }
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot start MarketSync due to configuration errors");
    }

    if let Some(port) = config.monitoring.metrics_port {
        init_metrics(port)?;
    }

    let metrics = SyncMetrics::new(&config.app.instrument);
    let mut controller = ModeController::from_config(&config, metrics)?;
    let shutdown = ShutdownController::with_ctrl_c();

    spawn_result_logger(&controller, &shutdown);

    info!(
        mode = %config.app.mode,
        interval_secs = config.refresh.interval_seconds,
        auto_refresh = config.refresh.auto_refresh,
        "Starting MarketSync"
    );
    drop(controller.start(config.app.mode.into()).await);
    println!("{}", ConsoleCommand::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.wait() => break,
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };

        let Some(line) = line else {
            debug!("stdin closed, waiting for Ctrl+C");
            shutdown.wait().await;
            break;
        };

        match ConsoleCommand::parse(&line) {
            Some(ConsoleCommand::Refresh) => {
                // Detached; the result logger reports the outcome
                drop(controller.manual_refresh().await);
                println!("refresh started");
            }
            Some(ConsoleCommand::ToggleAutoRefresh) => {
                let enabled = controller.toggle_auto_refresh().await;
                println!("auto-refresh {}", if enabled { "on" } else { "off" });
            }
            Some(ConsoleCommand::ToggleMode) => {
                drop(controller.toggle_mode().await);
                println!("mode: {}", controller.mode().await);
            }
            Some(ConsoleCommand::Snapshot) => print_snapshot(&controller.snapshot().await),
            Some(ConsoleCommand::Help) => println!("{}", ConsoleCommand::HELP),
            Some(ConsoleCommand::Quit) => {
                shutdown.shutdown("console");
                break;
            }
            None if line.trim().is_empty() => {}
            None => println!("unknown command '{}'; {}", line.trim(), ConsoleCommand::HELP),
        }
    }

    controller.shutdown();
    info!(reason = shutdown.reason().unwrap_or("unknown"), "MarketSync stopped");
    Ok(())
}

/// Log every committed analysis until shutdown
/// Apply the `run` overrides and validate.
///
/// The mode override is applied after validation: the file must be valid as
/// written, while `--mode external` without a feed endpoint still starts
/// and reports fetch errors.
fn prepare_run_config(
    mut config: MarketSyncConfig,
    mode: Option<ModeArg>,
    interval: Option<u64>,
    no_auto_refresh: bool,
) -> (MarketSyncConfig, ValidationReport) {
    if let Some(seconds) = interval {
        config.refresh.interval_seconds = seconds;
    }
    if no_auto_refresh {
        config.refresh.auto_refresh = false;
    }

    let report = validate_config(&config);

    if let Some(mode) = mode {
        config.app.mode = match mode {
            ModeArg::Simulated => AppMode::Simulated,
            ModeArg::External => AppMode::External,
        };
    }
    (config, report)
}

fn spawn_result_logger(controller: &ModeController, shutdown: &ShutdownController) {
    let mut results = controller.subscribe_results();
    let token = shutdown.child_token();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                changed = results.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(result) = results.borrow_and_update().clone() {
                        info!(
                            sentiment = ?result.sentiment,
                            confidence = result.confidence,
                            price_trend = ?result.price_trend,
                            oi_trend = ?result.oi_trend,
                            summary = %result.summary,
                            "New analysis"
                        );
                    }
                }
            }
        }
    });
}

fn print_snapshot(snapshot: &AppSnapshot) {
    println!();
    println!(
        "mode: {}  epoch: {}  status: {:?}  auto-refresh: {}  next refresh in: {}s",
        snapshot.mode,
        snapshot.epoch,
        snapshot.cycle.status,
        snapshot.cycle.auto_refresh_enabled,
        snapshot.cycle.countdown_seconds
    );

    let skip = snapshot.series.len().saturating_sub(SNAPSHOT_TAIL);
    for point in snapshot.series.iter().skip(skip) {
        println!(
            "  {}  spot {:>10.2}  fut {:>10.2}  basis {:>6.2}  oi {:>8}  {:?}",
            point.label,
            point.primary_price,
            point.derived_price,
            point.basis(),
            point.open_interest,
            point.source
        );
    }

    if !snapshot.option_series.is_empty() {
        println!("  option series: {}", snapshot.option_series.len());
    }
    match &snapshot.analysis {
        Some(analysis) => {
            println!(
                "  analysis: {:?} ({}%) {}",
                analysis.sentiment, analysis.confidence, analysis.summary
            );
            println!(
                "  support {}  resistance {}",
                analysis.support_band, analysis.resistance_band
            );
        }
        None => println!("  analysis: none"),
    }
    if let Some(err) = &snapshot.last_error {
        println!("  last error: {}", err);
    }
    println!();
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let (config, report) = match load_and_validate(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Instrument: {}", config.app.instrument);
    println!("Mode: {}", config.app.mode);
    println!("Series capacity: {}", config.series.capacity);
    println!(
        "Refresh: every {}s (auto: {})",
        config.refresh.interval_seconds, config.refresh.auto_refresh
    );
    println!("Analysis provider: {:?}", config.analysis.provider);

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    save_config(&generate_default_config(), output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Point feed.endpoint at your quote service");
    println!("  2. Export MARKETSYNC_FEED_KEY with the feed API key");
    println!(
        "  3. Run 'msync validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  4. Run 'msync run --config {:?}' to start the engine",
        output_path
    );

    Ok(())
}

fn simulate_command(points: usize, seed: Option<u64>, config_path: Option<PathBuf>) -> Result<()> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => MarketSyncConfig::default(),
    };
    let report = validate_config(&config);
    if !report.is_valid() {
        for err in &report.errors {
            eprintln!("error: {}", err);
        }
        anyhow::bail!("Cannot simulate with an invalid configuration");
    }

    let params = generator_params(&config.simulator, &config.series);
    let mut generator = match seed.or(config.simulator.rng_seed) {
        Some(seed) => SeriesGenerator::with_seed(params, seed),
        None => SeriesGenerator::new(params),
    };

    let series = generator.bootstrap(points);
    println!(
        "{}",
        serde_json::to_string_pretty(&series).context("Failed to serialize series")?
    );
    Ok(())
}
