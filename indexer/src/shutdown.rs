//! Graceful shutdown controller for the indexer.
//!
//! Owns the root [`CancellationToken`]. Each network loop gets a child
//! token and each cycle a grandchild, so cancelling the root stops
//! everything while a cycle can be aborted on its own.

use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
pub struct ShutdownController {
    root: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled together with the root.
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    ///
    /// Returns early if shutdown was triggered some other way.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
            _ = self.root.cancelled() => { return; }
        }

        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_cancels_children() {
        let controller = ShutdownController::new();
        let network = controller.child_token();
        let cycle = network.child_token();
        controller.shutdown();
        cycle.cancelled().await;
        assert!(network.is_cancelled());
        assert!(controller.is_shutdown());
    }

    #[tokio::test]
    async fn cancelling_a_cycle_leaves_the_root_alone() {
        let controller = ShutdownController::new();
        let cycle = controller.child_token().child_token();
        cycle.cancel();
        assert!(!controller.is_shutdown());
    }

    #[tokio::test]
    async fn wait_for_signal_returns_after_programmatic_shutdown() {
        let controller = ShutdownController::new();
        let waiter = controller.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_signal().await });
        controller.shutdown();
        handle.await.unwrap();
    }
}
