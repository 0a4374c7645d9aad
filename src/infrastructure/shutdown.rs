//! Graceful Shutdown Handler
//!
//! Coordinates cancellation of running batches and server shutdown.
//! Batches poll the controller between identifiers, never mid-call.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Notify;

/// Shutdown coordinator for graceful termination.
///
/// Tracks running batches and signals shutdown to all components.
#[derive(Clone)]
pub struct ShutdownController {
    /// Whether shutdown has been initiated
    shutdown_initiated: Arc<AtomicBool>,
    /// Number of batches currently running
    active_batches: Arc<AtomicUsize>,
    /// Broadcast channel for shutdown signal
    shutdown_tx: broadcast::Sender<()>,
    /// Notify when all batches are drained
    drain_complete: Arc<Notify>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            active_batches: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            drain_complete: Arc::new(Notify::new()),
        }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiate graceful shutdown.
    pub fn shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            tracing::info!("initiating graceful shutdown");
            let _ = self.shutdown_tx.send(());
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    pub fn active_batches(&self) -> usize {
        self.active_batches.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been initiated, including before the call.
    pub async fn cancelled(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }

    fn batch_ended(&self) {
        let prev = self.active_batches.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.drain_complete.notify_waiters();
        }
    }

    /// Wait for running batches to finish their final commit (with timeout).
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        // Register before reading the count so a batch ending in between
        // still wakes us.
        let drained = self.drain_complete.notified();
        tokio::pin!(drained);
        drained.as_mut().enable();

        if self.active_batches() == 0 {
            return true;
        }

        tokio::select! {
            _ = &mut drained => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    "drain timeout: {} batches still running",
                    self.active_batches()
                );
                false
            }
        }
    }

    /// Register a running batch; the count drops when the guard does.
    pub fn batch_guard(&self) -> BatchGuard {
        self.active_batches.fetch_add(1, Ordering::SeqCst);
        BatchGuard {
            controller: self.clone(),
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for a running batch.
pub struct BatchGuard {
    controller: ShutdownController,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.controller.batch_ended();
    }
}

/// Wait for Ctrl+C or SIGTERM, then initiate shutdown.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, cancelling after the current lookup");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, cancelling after the current lookup");
        }
    }

    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_controller_new() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());
        assert_eq!(controller.active_batches(), 0);
    }

    #[test]
    fn test_shutdown_initiates_once() {
        let controller = ShutdownController::new();

        controller.shutdown();
        assert!(controller.is_shutdown());

        controller.shutdown();
        assert!(controller.is_shutdown());
    }

    #[test]
    fn test_batch_guard() {
        let controller = ShutdownController::new();

        let first = controller.batch_guard();
        let second = controller.batch_guard();
        assert_eq!(controller.active_batches(), 2);

        drop(first);
        assert_eq!(controller.active_batches(), 1);
        drop(second);
        assert_eq!(controller.active_batches(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_receives_shutdown() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();

        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_drain_immediate() {
        let controller = ShutdownController::new();
        controller.shutdown();

        assert!(controller.wait_for_drain(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_with_running_batch() {
        let controller = ShutdownController::new();
        let guard = controller.batch_guard();
        controller.shutdown();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_without_shutdown() {
        let controller = ShutdownController::new();
        let guard = controller.batch_guard();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_secs(5)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_for_drain_never_misses_last_batch() {
        for _ in 0..200 {
            let controller = ShutdownController::new();
            let guard = controller.batch_guard();
            let ender = std::thread::spawn(move || drop(guard));

            let drained = tokio::time::timeout(
                Duration::from_secs(2),
                controller.wait_for_drain(Duration::from_secs(30)),
            )
            .await;
            ender.join().unwrap();
            assert_eq!(drained, Ok(true));
        }
    }

    #[tokio::test]
    async fn test_cancelled_after_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(100), controller.cancelled()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_on_shutdown() {
        let controller = ShutdownController::new();
        let waiter = controller.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.shutdown();

        assert!(tokio::time::timeout(Duration::from_millis(100), handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_drain_timeout() {
        let controller = ShutdownController::new();
        let _guard = controller.batch_guard();
        controller.shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
    }

    #[test]
    fn test_clone_shares_state() {
        let controller = ShutdownController::new();
        let cloned = controller.clone();

        let _guard = controller.batch_guard();
        assert_eq!(cloned.active_batches(), 1);

        cloned.shutdown();
        assert!(controller.is_shutdown());
    }
}
