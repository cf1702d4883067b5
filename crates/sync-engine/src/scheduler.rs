//! Periodic refresh scheduling
//!
//! Two timers per run: the refresh tick and a one-second countdown that
//! wraps back to the full interval. Both live under one [`TimerHandle`], so
//! restarting or stopping the scheduler never leaves a stray timer behind.

use crate::guard::{CycleGuard, InFlightGuard};
use crate::timer::{spawn_repeating, TimerHandle};
use futures::Future;
use observability::SyncMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

pub struct RefreshScheduler {
    default_countdown: u64,
    timers: Option<TimerHandle>,
    guard: CycleGuard,
    countdown_tx: Arc<watch::Sender<u64>>,
    metrics: SyncMetrics,
}

impl RefreshScheduler {
    pub fn new(default_interval: Duration, guard: CycleGuard, metrics: SyncMetrics) -> Self {
        let default_countdown = default_interval.max(MIN_INTERVAL).as_secs();
        let (countdown_tx, _) = watch::channel(default_countdown);

        Self {
            default_countdown,
            timers: None,
            guard,
            countdown_tx: Arc::new(countdown_tx),
            metrics,
        }
    }

    /// Start ticking every `interval`, replacing any running timers.
    ///
    /// A tick that finds the previous tick's work still in flight is
    /// skipped. Otherwise `on_tick` receives the guard, taken when the tick
    /// fired, and its work holds it until done. Work started by a tick is
    /// cancelled when the scheduler stops.
    pub fn start<F, Fut>(&mut self, interval: Duration, on_tick: F)
    where
        F: Fn(InFlightGuard) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.timers = None;

        let interval = interval.max(MIN_INTERVAL);
        let seconds = interval.as_secs();
        self.countdown_tx.send_replace(seconds);

        let token = CancellationToken::new();

        let tick_task = {
            let guard = self.guard.clone();
            let metrics = self.metrics.clone();
            let work_token = token.clone();
            spawn_repeating(interval, token.clone(), move || {
                match guard.try_acquire() {
                    Some(in_flight) => {
                        let work = on_tick(in_flight);
                        let token = work_token.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                biased;
                                _ = token.cancelled() => debug!("Tick work cancelled"),
                                _ = work => {}
                            }
                        });
                    }
                    None => {
                        debug!("Previous cycle still in flight, skipping tick");
                        metrics.tick_skipped();
                    }
                }
                futures::future::ready(())
            })
        };

        let countdown_task = {
            let countdown_tx = self.countdown_tx.clone();
            spawn_repeating(Duration::from_secs(1), token.clone(), move || {
                countdown_tx.send_modify(|c| *c = if *c <= 1 { seconds } else { *c - 1 });
                futures::future::ready(())
            })
        };

        self.timers = Some(TimerHandle::new(token, vec![tick_task, countdown_task]));
        info!(interval_secs = seconds, "Refresh scheduler started");
    }

    /// Cancel both timers and reset the countdown
    pub fn stop(&mut self) {
        if self.timers.take().is_some() {
            info!("Refresh scheduler stopped");
        }
        self.countdown_tx.send_replace(self.default_countdown);
    }

    pub fn is_running(&self) -> bool {
        self.timers.is_some()
    }

    pub fn countdown(&self) -> u64 {
        *self.countdown_tx.borrow()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<u64> {
        self.countdown_tx.subscribe()
    }

    /// Whether a cycle currently holds the in-flight guard
    pub fn in_flight(&self) -> bool {
        self.guard.is_held()
    }
}
