//! Shared application state
//!
//! One [`AppState`] behind an async `RwLock`. Writers are the controller and
//! the sequencer it owns; the lock is only held across synchronous sections.

use market_data::{
    AnalysisResult, CycleStatus, DataPoint, OptionSeriesEntry, RefreshCycleState, SeriesGenerator,
    SeriesStore,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SharedState = Arc<RwLock<AppState>>;

/// Where new data points come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Locally generated random walk
    #[default]
    Simulated,
    /// Authoritative quotes fetched from the feed
    External,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Simulated => Mode::External,
            Mode::External => Mode::Simulated,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Simulated => write!(f, "simulated"),
            Mode::External => write!(f, "external"),
        }
    }
}

impl From<config::AppMode> for Mode {
    fn from(mode: config::AppMode) -> Self {
        match mode {
            config::AppMode::Simulated => Mode::Simulated,
            config::AppMode::External => Mode::External,
        }
    }
}

pub struct AppState {
    pub mode: Mode,
    /// Bumped on every mode switch and manual refresh
    pub epoch: u64,
    pub store: SeriesStore,
    pub generator: SeriesGenerator,
    pub option_series: Vec<OptionSeriesEntry>,
    pub analysis: Option<AnalysisResult>,
    pub status: CycleStatus,
    pub auto_refresh: bool,
    pub last_error: Option<String>,
}

impl AppState {
    pub fn new(store: SeriesStore, generator: SeriesGenerator, auto_refresh: bool) -> Self {
        Self {
            mode: Mode::Simulated,
            epoch: 0,
            store,
            generator,
            option_series: Vec::new(),
            analysis: None,
            status: CycleStatus::Idle,
            auto_refresh,
            last_error: None,
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    /// Invalidate every cycle started before now
    pub fn bump_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Drop the current result and return to `Idle`
    pub fn reset_cycle(&mut self) {
        self.analysis = None;
        self.status = CycleStatus::Idle;
        self.last_error = None;
    }

    pub(crate) fn fail(&mut self, fallback: AnalysisResult, message: String) {
        self.analysis = Some(fallback);
        self.status = CycleStatus::Error;
        self.last_error = Some(message);
    }

    /// Generate and append the next simulated point
    pub(crate) fn advance_simulation(&mut self) -> Option<&DataPoint> {
        let point = match self.store.latest() {
            Some(previous) => {
                let previous = previous.clone();
                self.generator.next(&previous)
            }
            None => self.generator.bootstrap(1).pop()?,
        };
        self.store.append(point);
        self.store.latest()
    }

    pub fn snapshot(&self, countdown_seconds: u64) -> AppSnapshot {
        AppSnapshot {
            mode: self.mode,
            epoch: self.epoch,
            series: self.store.snapshot(),
            option_series: self.option_series.clone(),
            analysis: self.analysis.clone(),
            cycle: RefreshCycleState {
                status: self.status,
                countdown_seconds,
                auto_refresh_enabled: self.auto_refresh,
            },
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only copy of the state for display
#[derive(Debug, Clone, Serialize)]
pub struct AppSnapshot {
    pub mode: Mode,
    pub epoch: u64,
    pub series: Vec<DataPoint>,
    pub option_series: Vec<OptionSeriesEntry>,
    pub analysis: Option<AnalysisResult>,
    pub cycle: RefreshCycleState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        let mut generator = SeriesGenerator::with_seed(Default::default(), 7);
        let store = SeriesStore::from_points(10, generator.bootstrap(10)).unwrap();
        AppState::new(store, generator, true)
    }

    #[test]
    fn test_epoch_invalidates_older_cycles() {
        let mut state = state();
        let captured = state.epoch;
        assert!(state.is_current(captured));

        assert_eq!(state.bump_epoch(), captured + 1);
        assert!(!state.is_current(captured));
    }

    #[test]
    fn test_advance_simulation_keeps_window() {
        let mut state = state();
        let before = state.store.latest().cloned().unwrap();

        let appended = state.advance_simulation().cloned().unwrap();
        assert!(appended.timestamp > before.timestamp);
        assert_eq!(state.store.len(), 10);
    }

    #[test]
    fn test_snapshot_serializes_mode_and_cycle() {
        let mut state = state();
        state.mode = Mode::External;
        state.status = CycleStatus::Loading;

        let json = serde_json::to_value(state.snapshot(42)).unwrap();
        assert_eq!(json["mode"], "external");
        assert_eq!(json["cycle"]["status"], "loading");
        assert_eq!(json["cycle"]["countdown_seconds"], 42);
        assert_eq!(json["series"].as_array().map(Vec::len), Some(10));
        assert!(json.get("last_error").is_none());
    }

    #[test]
    fn test_mode_toggle() {
        assert_eq!(Mode::Simulated.toggled(), Mode::External);
        assert_eq!(Mode::External.to_string(), "external");
        assert_eq!(Mode::from(config::AppMode::External), Mode::External);
    }
}
