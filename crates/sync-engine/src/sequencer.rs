//! One refresh cycle: fetch, merge, analyze
//!
//! The state lock is taken only for the synchronous commit steps, never
//! across the fetch or the analysis call. Every commit first checks the
//! epoch captured when the cycle was scheduled, and for guarded cycles that
//! the cycle still owns the in-flight guard; a mode switch or manual refresh
//! in between turns the cycle into a no-op.

use crate::guard::InFlightGuard;
use crate::state::{AppState, SharedState};
use analysis::{AnalysisRequest, MarketAnalyzer};
use feed::SnapshotSource;
use market_data::{
    AnalysisResult, Citation, CycleStatus, DataPoint, HistoryReconciler, OptionSeriesEntry,
    PointSource,
};
use observability::{CycleTimer, SyncMetrics};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    /// Fetch a snapshot, merge it, then analyze
    FetchAndAnalyze,
    /// Analyze the current series without fetching
    AnalyzeOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Analysis stored, status `Success`
    Completed(AnalysisResult),
    /// Fallback stored, status `Error`
    Failed(AnalysisResult),
    /// Superseded before committing; state untouched
    Discarded,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Completed(_) => "completed",
            CycleOutcome::Failed(_) => "failed",
            CycleOutcome::Discarded => "discarded",
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            CycleOutcome::Completed(r) | CycleOutcome::Failed(r) => Some(r),
            CycleOutcome::Discarded => None,
        }
    }
}

/// What a cycle must still hold for its commits to land
#[derive(Clone, Copy)]
struct Lease<'a> {
    epoch: u64,
    in_flight: Option<&'a InFlightGuard>,
}

impl Lease<'_> {
    fn is_live(&self, state: &AppState) -> bool {
        state.is_current(self.epoch) && self.in_flight.map_or(true, InFlightGuard::is_owner)
    }
}

/// Inputs to the analysis step gathered under the lock
struct AnalysisInput {
    series: Vec<DataPoint>,
    previous: Option<DataPoint>,
    citations: Vec<Citation>,
    option_series: Vec<OptionSeriesEntry>,
}

pub struct AnalysisSequencer {
    source: Arc<dyn SnapshotSource>,
    analyzer: Arc<dyn MarketAnalyzer>,
    reconciler: HistoryReconciler,
    user_prompt: Option<String>,
    results_tx: watch::Sender<Option<AnalysisResult>>,
    metrics: SyncMetrics,
}

impl AnalysisSequencer {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        analyzer: Arc<dyn MarketAnalyzer>,
        reconciler: HistoryReconciler,
        metrics: SyncMetrics,
    ) -> Self {
        let (results_tx, _) = watch::channel(None);
        Self {
            source,
            analyzer,
            reconciler,
            user_prompt: None,
            results_tx,
            metrics,
        }
    }

    pub fn with_user_prompt(mut self, prompt: Option<String>) -> Self {
        self.user_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    /// Every committed result, successful or fallback
    pub fn subscribe_results(&self) -> watch::Receiver<Option<AnalysisResult>> {
        self.results_tx.subscribe()
    }

    /// Run one cycle against `state` on behalf of `epoch`.
    ///
    /// Never fails: fetch and analysis errors end as [`CycleOutcome::Failed`]
    /// with a neutral fallback stored in the state.
    pub async fn run_cycle(
        &self,
        state: &SharedState,
        epoch: u64,
        kind: CycleKind,
    ) -> CycleOutcome {
        self.run(state, Lease { epoch, in_flight: None }, kind).await
    }

    /// Like [`run_cycle`](Self::run_cycle), but every commit also requires
    /// `in_flight` to still own the cycle guard.
    pub async fn run_guarded(
        &self,
        state: &SharedState,
        epoch: u64,
        kind: CycleKind,
        in_flight: &InFlightGuard,
    ) -> CycleOutcome {
        let lease = Lease {
            epoch,
            in_flight: Some(in_flight),
        };
        self.run(state, lease, kind).await
    }

    async fn run(&self, state: &SharedState, lease: Lease<'_>, kind: CycleKind) -> CycleOutcome {
        let mut timer = CycleTimer::new(&self.metrics);
        let outcome = self.execute(state, lease, kind).await;
        timer.set_outcome(outcome.label());

        if let Some(result) = outcome.result() {
            self.results_tx.send_replace(Some(result.clone()));
        }
        outcome
    }

    async fn execute(
        &self,
        state: &SharedState,
        lease: Lease<'_>,
        kind: CycleKind,
    ) -> CycleOutcome {
        let epoch = lease.epoch;
        {
            let mut s = state.write().await;
            if !lease.is_live(&s) {
                debug!(epoch, current = s.epoch, "Cycle superseded before start");
                return CycleOutcome::Discarded;
            }
            s.status = CycleStatus::Loading;
        }

        let input = match kind {
            CycleKind::FetchAndAnalyze => match self.fetch_and_merge(state, lease).await {
                Ok(input) => input,
                Err(outcome) => return outcome,
            },
            CycleKind::AnalyzeOnly => {
                let s = state.read().await;
                if !lease.is_live(&s) {
                    return CycleOutcome::Discarded;
                }
                AnalysisInput {
                    series: s.store.snapshot(),
                    previous: s.store.previous().cloned(),
                    citations: Vec::new(),
                    option_series: s.option_series.clone(),
                }
            }
        };

        let citations = input.citations.clone();
        let request = AnalysisRequest::new(input.series, input.previous)
            .with_citations(input.citations)
            .with_option_series(input.option_series)
            .with_user_prompt(self.user_prompt.clone());

        debug!(
            analyzer = self.analyzer.name(),
            points = request.series.len(),
            "Analyzing series"
        );
        let analyzed = self.analyzer.analyze(request).await;

        let mut s = state.write().await;
        if !lease.is_live(&s) {
            debug!(epoch, current = s.epoch, "Analysis superseded, discarding");
            return CycleOutcome::Discarded;
        }

        match analyzed {
            Ok(result) => {
                let merged = merge_citations(citations, &result.source_citations);
                let result = result.with_citations(merged);
                info!(
                    sentiment = ?result.sentiment,
                    confidence = result.confidence,
                    basis = result.basis,
                    "Analysis updated"
                );
                s.analysis = Some(result.clone());
                s.status = CycleStatus::Success;
                s.last_error = None;
                CycleOutcome::Completed(result)
            }
            Err(e) => {
                warn!(error = %e, "Analysis failed");
                let fallback = AnalysisResult::fallback(
                    s.store.points(),
                    format!("Analysis unavailable: {}", e),
                )
                .with_citations(citations);
                s.fail(fallback.clone(), e.to_string());
                CycleOutcome::Failed(fallback)
            }
        }
    }

    /// Fetch a snapshot and merge it; `Err` carries the finished outcome.
    async fn fetch_and_merge(
        &self,
        state: &SharedState,
        lease: Lease<'_>,
    ) -> Result<AnalysisInput, CycleOutcome> {
        debug!(source = self.source.name(), "Fetching snapshot");
        let fetched = self.source.fetch_snapshot().await;

        let mut s = state.write().await;
        if !lease.is_live(&s) {
            debug!(epoch = lease.epoch, current = s.epoch, "Snapshot superseded, discarding");
            return Err(CycleOutcome::Discarded);
        }

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Snapshot fetch failed");
                let fallback = AnalysisResult::fallback(
                    s.store.points(),
                    format!("Market data unavailable: {}", e),
                );
                s.fail(fallback.clone(), e.to_string());
                return Err(CycleOutcome::Failed(fallback));
            }
        };

        let previous = s.store.latest().cloned();
        if let Err(e) = self.merge(&mut s, snapshot.data_point) {
            warn!(error = %e, "Merging snapshot failed");
            let fallback =
                AnalysisResult::fallback(s.store.points(), format!("Merge failed: {}", e));
            s.fail(fallback.clone(), e.to_string());
            return Err(CycleOutcome::Failed(fallback));
        }
        s.option_series = snapshot.option_series;

        Ok(AnalysisInput {
            series: s.store.snapshot(),
            previous,
            citations: snapshot.citations,
            option_series: s.option_series.clone(),
        })
    }

    /// Reconcile over a simulated tail, append after an authoritative one
    fn merge(&self, state: &mut AppState, mut point: DataPoint) -> market_data::Result<()> {
        match state.store.latest().map(|p| (p.source, p.timestamp)) {
            Some((PointSource::Simulated, _)) => {
                self.reconciler.reconcile(&mut state.store, point)?;
                self.metrics.reconciled();
            }
            tail => {
                if let Some((_, tail_ts)) = tail {
                    point.stamp_after(tail_ts);
                }
                debug!(price = point.primary_price, "Appending authoritative point");
                state.store.append(point);
                self.metrics.point_appended();
            }
        }
        self.metrics.set_series_length(state.store.len());
        Ok(())
    }
}

/// Fetch citations first, then any new ones from the analyzer
fn merge_citations(mut citations: Vec<Citation>, extra: &[Citation]) -> Vec<Citation> {
    for citation in extra {
        if !citations.iter().any(|c| c.uri == citation.uri) {
            citations.push(citation.clone());
        }
    }
    citations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::CycleGuard;
    use analysis::{AnalysisError, MockAnalyzer};
    use assert_matches::assert_matches;
    use feed::{FetchError, MockSnapshotSource};
    use market_data::{SeriesGenerator, SeriesStore, Sentiment};
    use tokio::sync::Notify;

    fn shared_state(len: usize) -> SharedState {
        let mut generator = SeriesGenerator::with_seed(Default::default(), 11);
        let store = SeriesStore::from_points(len, generator.bootstrap(len)).unwrap();
        AppState::new(store, generator, true).into_shared()
    }

    fn sequencer(
        source: Arc<MockSnapshotSource>,
        analyzer: Arc<MockAnalyzer>,
    ) -> AnalysisSequencer {
        AnalysisSequencer::new(
            source,
            analyzer,
            HistoryReconciler::default(),
            SyncMetrics::new("test"),
        )
    }

    async fn wait_for_calls(calls: impl Fn() -> usize, expected: usize) {
        while calls() < expected {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_goes_loading_then_error() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(
            MockSnapshotSource::new(2600.0)
                .with_error(FetchError::Transport("connection refused".to_string()))
                .with_gate(gate.clone()),
        );
        let analyzer = Arc::new(MockAnalyzer::new());
        let sequencer = Arc::new(sequencer(source.clone(), analyzer.clone()));
        let state = shared_state(10);
        let before = state.read().await.store.snapshot();
        assert_eq!(state.read().await.status, CycleStatus::Idle);

        let task = {
            let (sequencer, state) = (sequencer.clone(), state.clone());
            tokio::spawn(async move {
                sequencer
                    .run_cycle(&state, 0, CycleKind::FetchAndAnalyze)
                    .await
            })
        };

        wait_for_calls(|| source.calls(), 1).await;
        assert_eq!(state.read().await.status, CycleStatus::Loading);

        gate.notify_one();
        let outcome = task.await.unwrap();

        assert_matches!(
            &outcome,
            CycleOutcome::Failed(r) if r.confidence == 0 && r.sentiment == Sentiment::Neutral
        );
        let s = state.read().await;
        assert_eq!(s.status, CycleStatus::Error);
        assert_eq!(s.store.snapshot(), before);
        assert!(s.last_error.as_deref().unwrap_or_default().contains("connection refused"));
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn test_simulated_tail_is_reconciled() {
        let source = Arc::new(MockSnapshotSource::new(2600.0));
        let analyzer = Arc::new(MockAnalyzer::new().with_sentiment(Sentiment::Bullish, 70));
        let sequencer = sequencer(source.clone(), analyzer.clone());
        let state = shared_state(10);
        let old_tail = state.read().await.store.latest().cloned().unwrap();

        let outcome = sequencer.run_cycle(&state, 0, CycleKind::FetchAndAnalyze).await;

        assert_matches!(&outcome, CycleOutcome::Completed(r) if r.sentiment == Sentiment::Bullish);
        let s = state.read().await;
        assert_eq!(s.status, CycleStatus::Success);
        assert_eq!(s.store.len(), 10);
        assert_eq!(s.store.latest().map(|p| p.primary_price), Some(2600.0));
        assert_eq!(s.store.latest().map(|p| p.source), Some(PointSource::External));
        assert_eq!(s.analysis.as_ref().map(|a| a.source_citations.len()), Some(1));

        let request = analyzer.last_request().unwrap();
        assert_eq!(request.previous, Some(old_tail));
        assert_eq!(request.series.len(), 10);
        assert_eq!(source.calls(), 1);
        assert_eq!(analyzer.calls(), 1);
    }

    #[tokio::test]
    async fn test_external_tail_appends() {
        let source = Arc::new(MockSnapshotSource::new(2600.0).with_quote(2601.0));
        let analyzer = Arc::new(MockAnalyzer::new());
        let sequencer = sequencer(source, analyzer);
        let state = shared_state(10);

        sequencer.run_cycle(&state, 0, CycleKind::FetchAndAnalyze).await;
        let first_external = state.read().await.store.snapshot();

        sequencer.run_cycle(&state, 0, CycleKind::FetchAndAnalyze).await;
        let s = state.read().await;
        let points = s.store.points();

        // Second quote appended without shifting the first
        assert_eq!(points.len(), 10);
        assert_eq!(points[8], first_external[9]);
        assert_eq!(points[9].primary_price, 2600.0);
        assert!(points[9].timestamp > points[8].timestamp);
    }

    #[tokio::test]
    async fn test_analysis_failure_keeps_merged_point() {
        let source = Arc::new(MockSnapshotSource::new(2600.0));
        let analyzer =
            Arc::new(MockAnalyzer::new().with_error(AnalysisError::Remote("503".to_string())));
        let sequencer = sequencer(source, analyzer);
        let state = shared_state(10);

        let outcome = sequencer.run_cycle(&state, 0, CycleKind::FetchAndAnalyze).await;

        assert_matches!(&outcome, CycleOutcome::Failed(r) if r.confidence == 0);
        let s = state.read().await;
        assert_eq!(s.status, CycleStatus::Error);
        assert_eq!(s.store.latest().map(|p| p.primary_price), Some(2600.0));
        // Basis of the merged mock quote
        assert_eq!(s.analysis.as_ref().map(|a| a.basis), Some(2.0));
        assert_eq!(s.analysis.as_ref().map(|a| a.source_citations.len()), Some(1));
    }

    #[tokio::test]
    async fn test_stale_epoch_discards_fetched_snapshot() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(MockSnapshotSource::new(2600.0).with_gate(gate.clone()));
        let analyzer = Arc::new(MockAnalyzer::new());
        let sequencer = Arc::new(sequencer(source.clone(), analyzer.clone()));
        let state = shared_state(10);
        let before = state.read().await.store.snapshot();

        let task = {
            let (sequencer, state) = (sequencer.clone(), state.clone());
            tokio::spawn(async move {
                sequencer
                    .run_cycle(&state, 0, CycleKind::FetchAndAnalyze)
                    .await
            })
        };
        wait_for_calls(|| source.calls(), 1).await;

        {
            let mut s = state.write().await;
            s.bump_epoch();
            s.reset_cycle();
        }
        gate.notify_one();

        assert_eq!(task.await.unwrap(), CycleOutcome::Discarded);
        let s = state.read().await;
        assert_eq!(s.store.snapshot(), before);
        assert_eq!(s.status, CycleStatus::Idle);
        assert!(s.analysis.is_none());
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_epoch_discards_analysis() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(MockSnapshotSource::new(2600.0));
        let analyzer = Arc::new(MockAnalyzer::new().with_gate(gate.clone()));
        let sequencer = Arc::new(sequencer(source, analyzer.clone()));
        let state = shared_state(10);

        let task = {
            let (sequencer, state) = (sequencer.clone(), state.clone());
            tokio::spawn(async move {
                sequencer
                    .run_cycle(&state, 0, CycleKind::FetchAndAnalyze)
                    .await
            })
        };
        wait_for_calls(|| analyzer.calls(), 1).await;

        state.write().await.bump_epoch();
        gate.notify_one();

        assert_eq!(task.await.unwrap(), CycleOutcome::Discarded);
        assert!(state.read().await.analysis.is_none());
    }

    #[tokio::test]
    async fn test_superseded_guard_holder_commits_nothing() {
        let source = Arc::new(MockSnapshotSource::new(2600.0));
        let analyzer = Arc::new(MockAnalyzer::new());
        let sequencer = sequencer(source.clone(), analyzer.clone());
        let state = shared_state(10);
        let epoch = state.write().await.bump_epoch();
        let before = state.read().await.store.snapshot();

        // Tick took the guard, then a forced cycle took it over; both saw the
        // same epoch.
        let guard = CycleGuard::new();
        let tick = guard.try_acquire().unwrap();
        let forced = guard.force_acquire();

        let outcome = sequencer
            .run_guarded(&state, epoch, CycleKind::FetchAndAnalyze, &tick)
            .await;
        assert_eq!(outcome, CycleOutcome::Discarded);
        assert_eq!(source.calls(), 0);
        assert_eq!(state.read().await.store.snapshot(), before);

        let outcome = sequencer
            .run_guarded(&state, epoch, CycleKind::FetchAndAnalyze, &forced)
            .await;
        assert_matches!(outcome, CycleOutcome::Completed(_));
        assert_eq!(source.calls(), 1);
        assert_eq!(analyzer.calls(), 1);

        let s = state.read().await;
        assert_eq!(s.store.len(), 10);
        assert_eq!(s.store.latest().map(|p| p.primary_price), Some(2600.0));
        assert_eq!(s.status, CycleStatus::Success);
    }

    #[tokio::test]
    async fn test_guard_lost_during_fetch_discards_snapshot() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(MockSnapshotSource::new(2600.0).with_gate(gate.clone()));
        let analyzer = Arc::new(MockAnalyzer::new());
        let sequencer = Arc::new(sequencer(source.clone(), analyzer.clone()));
        let state = shared_state(10);
        let before = state.read().await.store.snapshot();
        let guard = CycleGuard::new();

        let task = {
            let (sequencer, state) = (sequencer.clone(), state.clone());
            let tick = guard.try_acquire().unwrap();
            tokio::spawn(async move {
                sequencer
                    .run_guarded(&state, 0, CycleKind::FetchAndAnalyze, &tick)
                    .await
            })
        };
        wait_for_calls(|| source.calls(), 1).await;

        let _forced = guard.force_acquire();
        gate.notify_one();

        assert_eq!(task.await.unwrap(), CycleOutcome::Discarded);
        assert_eq!(state.read().await.store.snapshot(), before);
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_only_skips_fetch() {
        let source = Arc::new(MockSnapshotSource::new(2600.0));
        let analyzer = Arc::new(MockAnalyzer::new());
        let sequencer = sequencer(source.clone(), analyzer.clone());
        let state = shared_state(10);
        let (expected_previous, before) = {
            let s = state.read().await;
            (s.store.previous().cloned(), s.store.snapshot())
        };
        let mut results = sequencer.subscribe_results();

        let outcome = sequencer.run_cycle(&state, 0, CycleKind::AnalyzeOnly).await;

        assert_matches!(outcome, CycleOutcome::Completed(_));
        assert_eq!(source.calls(), 0);
        assert_eq!(state.read().await.store.snapshot(), before);
        assert_eq!(analyzer.last_request().unwrap().previous, expected_previous);
        assert!(results.has_changed().unwrap());
        assert!(results.borrow_and_update().is_some());
    }

    #[test]
    fn test_merge_citations_dedupes_by_uri() {
        let a = Citation { title: "a".to_string(), uri: "u1".to_string() };
        let b = Citation { title: "b".to_string(), uri: "u2".to_string() };
        let merged = merge_citations(vec![a.clone()], &[a.clone(), b.clone()]);
        assert_eq!(merged, vec![a, b]);
    }
}
