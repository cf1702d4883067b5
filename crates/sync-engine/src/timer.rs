//! Cancellable repeating timers

use futures::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Owns a group of timer tasks; cancelling or dropping it stops them all.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TimerHandle {
    pub fn new(token: CancellationToken, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { token, tasks }
    }

    /// Stop the timers without waiting for the handle to drop
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Run `on_tick` every `period`, first after one full period.
///
/// Each tick's future is awaited before the next tick; missed ticks are
/// skipped rather than bunched. Cancelling `token` also drops a tick that is
/// still running.
pub fn spawn_repeating<F, Fut>(
    period: Duration,
    token: CancellationToken,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = timer.tick() => {}
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = on_tick() => {}
            }
        }
    })
}
