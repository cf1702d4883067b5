use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "config/marketsync.yaml";

#[derive(Parser, Debug)]
#[command(name = "msync")]
#[command(about = "MarketSync - simulated and live market series with open interest analysis")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Log format override (pretty, json, compact)
    #[arg(long, global = true, env = "MSYNC_LOG_FORMAT")]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine and read console commands from stdin
    Run {
        /// Starting mode; defaults to app.mode from the configuration
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Override refresh.interval_seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Start with auto-refresh disabled
        #[arg(long)]
        no_auto_refresh: bool,
    },

    /// Validate configuration without starting the engine
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },

    /// Print a bootstrapped simulated series as JSON
    Simulate {
        /// Number of points
        #[arg(short, long, default_value_t = 50)]
        points: usize,

        /// RNG seed for a reproducible series
        #[arg(short, long)]
        seed: Option<u64>,

        /// Optional configuration for simulator parameters
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Locally generated random walk
    Simulated,
    /// Quotes from the configured feed
    External,
}

impl ModeArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModeArg::Simulated => "simulated",
            ModeArg::External => "external",
        }
    }
}

/// A line typed into the running engine's console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Refresh,
    ToggleAutoRefresh,
    ToggleMode,
    Snapshot,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line; blank or unknown input yields `None`
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "r" | "refresh" => Some(Self::Refresh),
            "a" | "auto" => Some(Self::ToggleAutoRefresh),
            "m" | "mode" => Some(Self::ToggleMode),
            "s" | "snapshot" => Some(Self::Snapshot),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }

    pub const HELP: &'static str = concat!(
        "commands: r = refresh now, a = toggle auto-refresh, m = switch mode, ",
        "s = snapshot, h = help, q = quit"
    );
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "msync",
            "run",
            "--mode",
            "external",
            "--interval",
            "30",
            "--no-auto-refresh",
        ]);
        match cli.command {
            Commands::Run {
                mode,
                config,
                interval,
                no_auto_refresh,
            } => {
                assert_eq!(mode, Some(ModeArg::External));
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG));
                assert_eq!(interval, Some(30));
                assert!(no_auto_refresh);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::parse_from(["msync", "simulate", "--seed", "7"]);
        match cli.command {
            Commands::Simulate { points, seed, config } => {
                assert_eq!(points, 50);
                assert_eq!(seed, Some(7));
                assert!(config.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_console_commands() {
        assert_eq!(ConsoleCommand::parse(" R \n"), Some(ConsoleCommand::Refresh));
        assert_eq!(ConsoleCommand::parse("mode"), Some(ConsoleCommand::ToggleMode));
        assert_eq!(ConsoleCommand::parse("q"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse(""), None);
        assert_eq!(ConsoleCommand::parse("xyz"), None);
    }
}
