//! Mode control
//!
//! [`ModeController`] owns the shared state, the sequencer, the refresh
//! scheduler and the simulation ticker. Mode switches and manual refreshes
//! bump the state epoch so that any cycle started earlier commits nothing.

use crate::error::EngineResult;
use crate::guard::CycleGuard;
use crate::scheduler::RefreshScheduler;
use crate::sequencer::{AnalysisSequencer, CycleKind, CycleOutcome};
use crate::settings::{build_analyzer, build_generator, build_source, EngineSettings};
use crate::state::{AppSnapshot, AppState, Mode, SharedState};
use crate::timer::{spawn_repeating, TimerHandle};
use analysis::MarketAnalyzer;
use config::MarketSyncConfig;
use feed::SnapshotSource;
use market_data::{AnalysisResult, CycleStatus, HistoryReconciler, SeriesGenerator, SeriesStore};
use observability::SyncMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const MIN_SIMULATION_INTERVAL: Duration = Duration::from_millis(10);

pub struct ModeController {
    state: SharedState,
    sequencer: Arc<AnalysisSequencer>,
    scheduler: RefreshScheduler,
    guard: CycleGuard,
    simulation: Option<TimerHandle>,
    /// Cancels forced cycles when the mode changes
    session: CancellationToken,
    settings: EngineSettings,
    metrics: SyncMetrics,
}

impl ModeController {
    /// Bootstrap a full window of simulated history and wire the engine.
    ///
    /// Nothing runs until [`start`](Self::start) is called.
    pub fn new(
        settings: EngineSettings,
        mut generator: SeriesGenerator,
        source: Arc<dyn SnapshotSource>,
        analyzer: Arc<dyn MarketAnalyzer>,
        metrics: SyncMetrics,
    ) -> EngineResult<Self> {
        let history = generator.bootstrap(settings.capacity);
        let store = SeriesStore::from_points(settings.capacity, history)?;
        metrics.set_series_length(store.len());

        info!(
            instrument = %settings.instrument,
            points = store.len(),
            source = source.name(),
            analyzer = analyzer.name(),
            "Series bootstrapped"
        );

        let state = AppState::new(store, generator, settings.auto_refresh).into_shared();
        let sequencer = AnalysisSequencer::new(
            source,
            analyzer,
            HistoryReconciler::new(settings.price_decimals),
            metrics.clone(),
        )
        .with_user_prompt(settings.user_prompt.clone());
        let guard = CycleGuard::new();
        let scheduler =
            RefreshScheduler::new(settings.refresh_interval, guard.clone(), metrics.clone());

        Ok(Self {
            state,
            sequencer: Arc::new(sequencer),
            scheduler,
            guard,
            simulation: None,
            session: CancellationToken::new(),
            settings,
            metrics,
        })
    }

    pub fn from_config(config: &MarketSyncConfig, metrics: SyncMetrics) -> EngineResult<Self> {
        Self::new(
            EngineSettings::from_config(config),
            build_generator(config),
            build_source(&config.feed)?,
            build_analyzer(&config.analysis)?,
            metrics,
        )
    }

    /// Activate the initial mode
    pub async fn start(&mut self, mode: Mode) -> Option<JoinHandle<CycleOutcome>> {
        self.switch_mode(mode).await
    }

    /// Enter `mode`, abandoning everything in flight.
    ///
    /// Entering `External` returns the handle of the immediate cycle.
    /// Re-entering the current mode restarts it.
    pub async fn switch_mode(&mut self, mode: Mode) -> Option<JoinHandle<CycleOutcome>> {
        self.stop_activity();

        let (epoch, auto_refresh) = {
            let mut s = self.state.write().await;
            s.mode = mode;
            s.reset_cycle();
            (s.bump_epoch(), s.auto_refresh)
        };
        info!(%mode, epoch, "Mode switched");

        match mode {
            Mode::Simulated => {
                self.start_simulation();
                None
            }
            Mode::External => {
                let handle = self.spawn_cycle(epoch, CycleKind::FetchAndAnalyze);
                if auto_refresh {
                    self.start_scheduler();
                }
                Some(handle)
            }
        }
    }

    pub async fn toggle_mode(&mut self) -> Option<JoinHandle<CycleOutcome>> {
        let mode = self.mode().await.toggled();
        self.switch_mode(mode).await
    }

    /// Disabling also abandons any cycle in flight, leaving status `Idle`.
    pub async fn set_auto_refresh(&mut self, enabled: bool) {
        if !enabled {
            self.scheduler.stop();
            self.cancel_session();
        }

        let mode = {
            let mut s = self.state.write().await;
            s.auto_refresh = enabled;
            if !enabled {
                s.status = CycleStatus::Idle;
                s.bump_epoch();
            }
            s.mode
        };

        if enabled && mode == Mode::External && !self.scheduler.is_running() {
            self.start_scheduler();
        }
        info!(enabled, "Auto-refresh updated");
    }

    /// Returns the new setting
    pub async fn toggle_auto_refresh(&mut self) -> bool {
        let enabled = !self.state.read().await.auto_refresh;
        self.set_auto_refresh(enabled).await;
        enabled
    }

    /// Start a cycle now, even if another one is in flight.
    ///
    /// External mode fetches and analyzes; simulated mode only analyzes the
    /// current series.
    pub async fn manual_refresh(&self) -> JoinHandle<CycleOutcome> {
        let (epoch, mode) = {
            let mut s = self.state.write().await;
            (s.bump_epoch(), s.mode)
        };
        let kind = match mode {
            Mode::External => CycleKind::FetchAndAnalyze,
            Mode::Simulated => CycleKind::AnalyzeOnly,
        };

        info!(epoch, ?kind, "Manual refresh");
        self.spawn_cycle(epoch, kind)
    }

    pub async fn snapshot(&self) -> AppSnapshot {
        let countdown = self.scheduler.countdown();
        self.state.read().await.snapshot(countdown)
    }

    pub async fn mode(&self) -> Mode {
        self.state.read().await.mode
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<u64> {
        self.scheduler.subscribe_countdown()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Option<AnalysisResult>> {
        self.sequencer.subscribe_results()
    }

    pub fn is_refreshing(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation.is_some()
    }

    pub fn in_flight(&self) -> bool {
        self.guard.is_held()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Cancel every timer and in-flight cycle
    pub fn shutdown(&mut self) {
        self.stop_activity();
        info!("Mode controller shut down");
    }

    fn stop_activity(&mut self) {
        self.scheduler.stop();
        self.simulation = None;
        self.cancel_session();
    }

    fn cancel_session(&mut self) {
        self.session.cancel();
        self.session = CancellationToken::new();
    }

    fn spawn_cycle(&self, epoch: u64, kind: CycleKind) -> JoinHandle<CycleOutcome> {
        let in_flight = self.guard.force_acquire();
        let state = self.state.clone();
        let sequencer = self.sequencer.clone();
        let token = self.session.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(epoch, "Cycle cancelled");
                    CycleOutcome::Discarded
                }
                outcome = sequencer.run_guarded(&state, epoch, kind, &in_flight) => outcome,
            }
        })
    }

    fn start_scheduler(&mut self) {
        let state = self.state.clone();
        let sequencer = self.sequencer.clone();

        self.scheduler.start(self.settings.refresh_interval, move |in_flight| {
            let state = state.clone();
            let sequencer = sequencer.clone();
            async move {
                let epoch = {
                    let s = state.read().await;
                    if s.mode != Mode::External {
                        return;
                    }
                    s.epoch
                };
                // A forced cycle taking the guard before this read makes the
                // tick commit nothing, whatever epoch it saw.
                sequencer
                    .run_guarded(&state, epoch, CycleKind::FetchAndAnalyze, &in_flight)
                    .await;
            }
        });
    }

    fn start_simulation(&mut self) {
        let token = CancellationToken::new();
        let state = self.state.clone();
        let metrics = self.metrics.clone();
        let period = self.settings.simulation_interval.max(MIN_SIMULATION_INTERVAL);

        let task = spawn_repeating(period, token.clone(), move || {
            let state = state.clone();
            let metrics = metrics.clone();
            async move {
                let mut s = state.write().await;
                if s.mode != Mode::Simulated {
                    return;
                }
                if let Some(point) = s.advance_simulation() {
                    debug!(price = point.primary_price, oi = point.open_interest, "Simulated tick");
                    metrics.point_appended();
                }
                metrics.set_series_length(s.store.len());
            }
        });

        self.simulation = Some(TimerHandle::new(token, vec![task]));
        debug!(period_ms = period.as_millis() as u64, "Simulation ticker started");
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        self.session.cancel();
    }
}
