//! Cancellation for in-flight Gateway calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Result, SyncError};
use crate::gateway::GatewayError;

/// A cloneable cancellation flag.
///
/// Clones observe the same flag. Once cancelled a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel every holder of this token. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run a Gateway call, giving up when this token is cancelled or when
    /// `timeout` elapses. A token that is already cancelled never polls
    /// `call`.
    pub(crate) async fn guard<R, F>(&self, timeout: Duration, call: F) -> Result<R>
    where
        F: Future<Output = std::result::Result<R, GatewayError>>,
    {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        tokio::select! {
            biased;
            () = self.cancelled() => Err(SyncError::Cancelled),
            outcome = tokio::time::timeout(timeout, call) => match outcome {
                Ok(result) => result.map_err(SyncError::from),
                Err(_) => Err(SyncError::Network(GatewayError::Timeout(timeout))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::task::yield_now().await;
        token.cancel();

        let woke = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(matches!(woke, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_already_cancelled_resolves_immediately() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();

        assert!(token.is_cancelled());
        let done = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(done.is_ok());
    }

    #[tokio::test]
    async fn test_guard_times_out() {
        let token = CancelToken::new();
        let result: Result<()> = token
            .guard(Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        assert_eq!(
            result,
            Err(SyncError::Network(GatewayError::Timeout(
                Duration::from_millis(10)
            )))
        );
    }

    #[tokio::test]
    async fn test_guard_skips_call_once_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let mut polled = false;

        let result = token
            .guard(Duration::from_secs(1), async {
                polled = true;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(SyncError::Cancelled));
        assert!(!polled);
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
