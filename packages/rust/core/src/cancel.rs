//! Cooperative cancellation for orchestration runs.

use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation token shared between a caller and an in-flight orchestration.
///
/// Cloning yields a handle to the same token. Cancelling aborts whatever the
/// orchestrator is currently awaiting (classification or a retrieval call).
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Create a new cancellation token (not cancelled).
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            cancelled: Arc::new(tx),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
