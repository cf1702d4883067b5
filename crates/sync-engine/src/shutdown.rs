//! Process shutdown signalling
//!
//! One [`ShutdownController`] per process. It is triggered by Ctrl+C or by
//! the `q` console command, and remembers which one came first.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also shut down on Ctrl+C
    pub fn with_ctrl_c() -> Self {
        let controller = Self::new();
        let listener = controller.clone();

        tokio::spawn(async move {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => listener.shutdown("ctrl-c"),
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                },
                _ = listener.token.cancelled() => {}
            }
        });

        controller
    }

    /// Token cancelled with this controller; may also be cancelled on its own
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger shutdown; only the first reason is kept
    pub fn shutdown(&self, reason: &str) {
        if self.reason.set(reason.to_string()).is_ok() {
            info!(reason, "Shutdown requested");
        }
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}

/// Run `future` unless shutdown comes first; `None` on shutdown
pub async fn run_until_shutdown<F, T>(token: CancellationToken, future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        result = future => Some(result),
        _ = token.cancelled() => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let controller = ShutdownController::new();
        let child = controller.child_token();

        controller.shutdown("console");
        controller.shutdown("ctrl-c");

        assert!(controller.is_cancelled());
        assert!(child.is_cancelled());
        assert_eq!(controller.reason(), Some("console"));
        controller.wait().await;
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let controller = ShutdownController::new();
        assert_eq!(run_until_shutdown(controller.child_token(), async { 7 }).await, Some(7));

        let token = controller.child_token();
        let pending = tokio::spawn(run_until_shutdown(
            token,
            tokio::time::sleep(Duration::from_secs(60)),
        ));
        controller.shutdown("test");
        assert_eq!(pending.await.unwrap(), None);
    }
}
