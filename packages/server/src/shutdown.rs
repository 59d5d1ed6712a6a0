//! Process-wide stop signal.

use std::sync::Arc;

use broker_core::ErrorCondition;
use tokio::sync::watch;

/// Cloneable trigger that stops the accept loop.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a graceful stop. Idempotent.
    pub fn trigger(&self, condition: &ErrorCondition) {
        if !self.tx.send_replace(true) {
            tracing::info!(%condition, "broker shutdown requested");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once a stop was requested, including before this call.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_after_trigger() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        let waiter = shutdown.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        shutdown.trigger(&ErrorCondition::new("shutdown", "test"));
        task.await.unwrap();

        // Late waiters see the stop as well.
        shutdown.wait().await;
        assert!(shutdown.is_triggered());
    }
}
