//! Client-side mirrors of server-owned collections.
//!
//! A [`Synchronizer`] holds the last known good snapshot of one collection
//! and keeps it consistent by brute force: every successful write is
//! followed by a full re-read, and a read replaces the snapshot whole. Local
//! state is therefore always a complete snapshot the Gateway actually
//! returned, never a half-applied merge.
//!
//! [`CartSync`] and [`WishlistSync`] put collection-specific operations on
//! top of the shared core.
//!
//! # Read ordering
//!
//! Writes are not queued; concurrent writes go out independently and each
//! triggers its own re-read. Every read takes a ticket when it starts, and a
//! finished read is applied only if no later-ticketed read has been applied
//! already. A slow read issued before a write can therefore never overwrite
//! the snapshot taken after it.
//!
//! Errors are stamped the same way. A failure is cleared only by a read
//! issued after it was recorded, so a read already in flight when a write
//! fails cannot hide that failure.

mod cart;
mod wishlist;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{Result, SyncError};
use crate::gateway::GatewayError;
use crate::notify::Notifier;

pub use cart::CartSync;
pub use wishlist::{Toggled, WishlistSync};

/// Coarse state for rendering spinners and error banners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Nothing in flight, last call succeeded.
    Idle,
    /// At least one call in flight.
    Loading,
    /// Nothing in flight, last call failed. The snapshot is the last good one.
    Error(String),
}

/// Everything the presentation layer can observe about one collection.
#[derive(Debug, Clone)]
pub struct SyncState<T> {
    /// Last successfully read snapshot.
    pub snapshot: T,
    /// Calls currently in flight.
    pub in_flight: usize,
    /// User-facing message from the last failure, cleared by a successful
    /// read issued after it.
    pub error: Option<String>,
    /// When the snapshot was last replaced.
    pub last_synced_at: Option<DateTime<Utc>>,
    applied_ticket: u64,
    error_ticket: u64,
}

impl<T> SyncState<T> {
    fn new(snapshot: T) -> Self {
        Self {
            snapshot,
            in_flight: 0,
            error: None,
            last_synced_at: None,
            applied_ticket: 0,
            error_ticket: 0,
        }
    }

    /// Derive the coarse status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        if self.in_flight > 0 {
            SyncStatus::Loading
        } else if let Some(message) = &self.error {
            SyncStatus::Error(message.clone())
        } else {
            SyncStatus::Idle
        }
    }

    /// Whether any call is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}

/// Shared core of every collection mirror.
#[derive(Debug)]
pub struct Synchronizer<T> {
    name: &'static str,
    state: watch::Sender<SyncState<T>>,
    next_ticket: AtomicU64,
    notifier: Notifier,
    cancel: CancelToken,
    timeout: Duration,
}

impl<T> Synchronizer<T>
where
    T: Clone + Send + Sync,
{
    /// Create a mirror starting from `initial`, before any read.
    #[must_use]
    pub fn new(name: &'static str, initial: T, notifier: Notifier, timeout: Duration) -> Self {
        let (state, _rx) = watch::channel(SyncState::new(initial));
        Self {
            name,
            state,
            next_ticket: AtomicU64::new(0),
            notifier,
            cancel: CancelToken::new(),
            timeout,
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Watch the whole state; the receiver wakes on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState<T>> {
        self.state.subscribe()
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> SyncState<T> {
        self.state.borrow().clone()
    }

    /// A copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> T {
        self.state.borrow().snapshot.clone()
    }

    /// Compute something from the current snapshot without cloning it.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.borrow().snapshot)
    }

    /// Current coarse status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.state.borrow().status()
    }

    /// Whether any call on this mirror is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// The persistent inline error message, if the last call failed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Token that cancels every in-flight and future call on this mirror.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancel in-flight calls and refuse new ones.
    pub fn teardown(&self) {
        debug!(collection = self.name, "Tearing down synchronizer");
        self.cancel.cancel();
    }

    /// Whether [`teardown`](Self::teardown) has run.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Read the collection and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the read failure; the snapshot is left untouched. A failure
    /// that lands after a newer read was already applied is still returned,
    /// but does not touch the error state: the snapshot it would have
    /// replaced is newer than anything it could have brought.
    pub async fn load_with<F>(&self, fetch: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<T, GatewayError>> + Send,
    {
        self.begin();
        self.read_and_apply(fetch).await
    }

    /// Send a write and, if it succeeds, re-read the collection.
    ///
    /// Publishes exactly one notice: `success` if the write went through, the
    /// failure's user message otherwise. Cancelled writes publish nothing.
    /// A failed write leaves the snapshot untouched and skips the re-read.
    ///
    /// A failed re-read after a successful write is recorded in the error
    /// state but not returned: the write happened, and retrying it could
    /// apply it twice.
    ///
    /// # Errors
    ///
    /// Returns the write failure.
    pub async fn mutate_with<W, R, F>(
        &self,
        action: &'static str,
        success: impl Into<String> + Send,
        write: W,
        reload: R,
    ) -> Result<()>
    where
        W: Future<Output = std::result::Result<(), GatewayError>> + Send,
        R: FnOnce() -> F + Send,
        F: Future<Output = std::result::Result<T, GatewayError>> + Send,
    {
        self.begin();

        if let Err(err) = self.guarded(write).await {
            warn!(
                collection = self.name,
                action,
                error = %err,
                "Write failed, keeping last snapshot"
            );
            self.finish_with_error(&err, self.issued_ticket());
            if !matches!(err, SyncError::Cancelled) {
                self.notifier.error(err.user_message());
            }
            return Err(err);
        }

        self.notifier.success(success);

        if let Err(err) = self.read_and_apply(reload()).await {
            warn!(
                collection = self.name,
                action,
                error = %err,
                "Re-read after write failed, snapshot is stale"
            );
        }
        Ok(())
    }

    /// Refuse an operation before any request is made.
    ///
    /// # Errors
    ///
    /// Always returns `err`, after recording it like any other failure.
    pub fn reject(&self, err: SyncError) -> Result<()> {
        debug!(collection = self.name, error = %err, "Rejected before sending");
        let message = err.user_message();
        let ticket = self.issued_ticket();
        self.state.send_modify(|state| {
            state.error = Some(message.clone());
            state.error_ticket = ticket;
        });
        self.notifier.error(message);
        Err(err)
    }

    fn begin(&self) {
        self.state.send_modify(|state| state.in_flight += 1);
    }

    /// Last ticket handed to a read. Reads issued later compare greater.
    fn issued_ticket(&self) -> u64 {
        self.next_ticket.load(Ordering::Relaxed)
    }

    /// Leave the in-flight count and record `err`, stamped with `ticket`.
    fn finish_with_error(&self, err: &SyncError, ticket: u64) {
        let message = (!matches!(err, SyncError::Cancelled)).then(|| err.user_message());
        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            if message.is_some() {
                state.error.clone_from(&message);
                state.error_ticket = ticket;
            }
        });
    }

    /// Run a read whose `begin` has already been counted, then apply it.
    async fn read_and_apply<F>(&self, fetch: F) -> Result<()>
    where
        F: Future<Output = std::result::Result<T, GatewayError>> + Send,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;

        match self.guarded(fetch).await {
            Ok(snapshot) => {
                self.state.send_modify(|state| {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    if ticket > state.applied_ticket {
                        state.snapshot = snapshot;
                        state.applied_ticket = ticket;
                        state.last_synced_at = Some(Utc::now());
                        if ticket > state.error_ticket {
                            state.error = None;
                        }
                    } else {
                        debug!(
                            collection = self.name,
                            ticket,
                            applied = state.applied_ticket,
                            "Discarding read older than the current snapshot"
                        );
                    }
                });
                Ok(())
            }
            Err(err) => {
                warn!(collection = self.name, error = %err, "Read failed");
                let stale = ticket <= self.state.borrow().applied_ticket;
                if stale {
                    // A newer read already succeeded; this failure is moot.
                    self.state
                        .send_modify(|state| state.in_flight = state.in_flight.saturating_sub(1));
                } else {
                    self.finish_with_error(&err, ticket);
                }
                Err(err)
            }
        }
    }

    async fn guarded<R, F>(&self, call: F) -> Result<R>
    where
        F: Future<Output = std::result::Result<R, GatewayError>> + Send,
    {
        self.cancel.guard(self.timeout, call).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::NoticeLevel;

    fn synchronizer() -> Synchronizer<Vec<u32>> {
        Synchronizer::new("test", Vec::new(), Notifier::new(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_load_replaces_snapshot_and_clears_error() {
        let sync = synchronizer();

        let err = sync
            .load_with(async { Err(GatewayError::rejected("nope")) })
            .await;
        assert!(err.is_err());
        assert_eq!(sync.status(), SyncStatus::Error("nope".to_string()));

        sync.load_with(async { Ok(vec![1, 2]) }).await.unwrap();
        assert_eq!(sync.snapshot(), vec![1, 2]);
        assert_eq!(sync.status(), SyncStatus::Idle);
        assert!(sync.state().last_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_last_good_snapshot() {
        let sync = synchronizer();
        sync.load_with(async { Ok(vec![7]) }).await.unwrap();

        let result = sync
            .load_with(async { Err(GatewayError::Unreachable("down".to_string())) })
            .await;

        assert!(matches!(result, Err(SyncError::Network(_))));
        assert_eq!(sync.snapshot(), vec![7]);
        assert!(sync.error().is_some());
    }

    #[tokio::test]
    async fn test_failed_write_skips_reload_and_notifies() {
        let sync = synchronizer();
        let mut notices = sync.notifier.subscribe();
        let mut reloaded = false;

        let result = sync
            .mutate_with(
                "add",
                "Added",
                async { Err(GatewayError::rejected("Out of stock")) },
                || {
                    reloaded = true;
                    async { Ok(vec![1]) }
                },
            )
            .await;

        assert!(result.is_err());
        assert!(!reloaded);
        assert!(sync.snapshot().is_empty());
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Out of stock");
    }

    #[tokio::test]
    async fn test_successful_write_reloads() {
        let sync = synchronizer();
        let mut notices = sync.notifier.subscribe();

        sync.mutate_with("add", "Added", async { Ok(()) }, || async { Ok(vec![3]) })
            .await
            .unwrap();

        assert_eq!(sync.snapshot(), vec![3]);
        assert_eq!(sync.status(), SyncStatus::Idle);
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_reload_failure_after_write_is_recorded_not_returned() {
        let sync = synchronizer();

        let result = sync
            .mutate_with("add", "Added", async { Ok(()) }, || async {
                Err(GatewayError::Unreachable("down".to_string()))
            })
            .await;

        assert!(result.is_ok());
        assert!(sync.error().is_some());
    }

    #[tokio::test]
    async fn test_stale_read_is_discarded() {
        let sync = synchronizer();

        let slow = sync.load_with(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(vec![1])
        });
        let fast = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            sync.load_with(async { Ok(vec![1, 2]) }).await
        };

        let (a, b) = tokio::join!(slow, fast);
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(sync.snapshot(), vec![1, 2]);
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn test_stale_failed_read_returns_error_without_recording_it() {
        let sync = synchronizer();

        let slow = sync.load_with(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err(GatewayError::Unreachable("reset".to_string()))
        });
        let fast = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            sync.load_with(async { Ok(vec![3]) }).await
        };
        let (a, b) = tokio::join!(slow, fast);

        assert!(matches!(a, Err(SyncError::Network(_))));
        assert!(b.is_ok());
        assert_eq!(sync.snapshot(), vec![3]);
        assert_eq!(sync.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let sync = Synchronizer::new(
            "test",
            Vec::<u32>::new(),
            Notifier::new(),
            Duration::from_millis(10),
        );

        let result = sync
            .load_with(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(vec![1])
            })
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Network(GatewayError::Timeout(_)))
        ));
        assert!(sync.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_cancels_in_flight_and_future_calls() {
        let sync = synchronizer();

        let load = sync.load_with(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(vec![1])
        });
        let teardown = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            sync.teardown();
        };
        let (result, ()) = tokio::join!(load, teardown);

        assert_eq!(result, Err(SyncError::Cancelled));
        assert!(sync.is_torn_down());
        assert!(!sync.is_loading());
        // Cancellation is not a user-facing error
        assert!(sync.error().is_none());

        let again = sync.load_with(async { Ok(vec![2]) }).await;
        assert_eq!(again, Err(SyncError::Cancelled));
        assert!(sync.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_reject_sets_error_without_loading() {
        let sync = synchronizer();
        let result = sync.reject(SyncError::Precondition("bad quantity".to_string()));

        assert!(result.is_err());
        assert_eq!(sync.status(), SyncStatus::Error("bad quantity".to_string()));
    }

    /// Run `load_with(fetch)` while recording every state the receiver sees.
    async fn observe_load<F>(sync: &Synchronizer<Vec<u32>>, fetch: F) -> Vec<SyncState<Vec<u32>>>
    where
        F: Future<Output = std::result::Result<Vec<u32>, GatewayError>> + Send,
    {
        let mut rx = sync.subscribe();
        rx.mark_unchanged();
        let mut seen = Vec::new();

        let load = sync.load_with(fetch);
        tokio::pin!(load);
        loop {
            tokio::select! {
                biased;
                changed = rx.changed() => {
                    changed.unwrap();
                    seen.push(rx.borrow_and_update().clone());
                }
                result = &mut load => {
                    result.unwrap();
                    break;
                }
            }
        }
        if rx.has_changed().unwrap() {
            seen.push(rx.borrow_and_update().clone());
        }
        seen
    }

    async fn slow<T>(value: T) -> std::result::Result<T, GatewayError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(value)
    }

    #[tokio::test]
    async fn test_subscribers_see_loading_then_idle() {
        let sync = synchronizer();

        let seen = observe_load(&sync, slow(vec![9])).await;

        let statuses: Vec<SyncStatus> = seen.iter().map(SyncState::status).collect();
        assert_eq!(statuses, vec![SyncStatus::Loading, SyncStatus::Idle]);
        assert!(seen[0].snapshot.is_empty());
        assert_eq!(seen[1].snapshot, vec![9]);
    }

    #[tokio::test]
    async fn test_is_loading_while_call_in_flight() {
        let sync = synchronizer();

        let load = sync.load_with(slow(vec![1]));
        let check = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            (sync.is_loading(), sync.status())
        };
        let (result, (loading, status)) = tokio::join!(load, check);

        result.unwrap();
        assert!(loading);
        assert_eq!(status, SyncStatus::Loading);
        assert!(!sync.is_loading());
        assert_eq!(sync.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_error_then_loading_keeps_last_good_snapshot() {
        let sync = synchronizer();
        sync.load_with(async { Ok(vec![4]) }).await.unwrap();
        let _ = sync
            .load_with(async { Err(GatewayError::rejected("Try again later")) })
            .await;
        assert_eq!(sync.status(), SyncStatus::Error("Try again later".to_string()));

        let seen = observe_load(&sync, slow(vec![4, 5])).await;

        let statuses: Vec<SyncStatus> = seen.iter().map(SyncState::status).collect();
        assert_eq!(statuses, vec![SyncStatus::Loading, SyncStatus::Idle]);
        // While loading the error is still recorded and the snapshot is the last good one
        assert_eq!(seen[0].error.as_deref(), Some("Try again later"));
        assert_eq!(seen[0].snapshot, vec![4]);
        assert_eq!(seen[1].snapshot, vec![4, 5]);
        assert_eq!(seen[1].error, None);
    }

    #[tokio::test]
    async fn test_read_issued_before_failure_keeps_error() {
        let sync = synchronizer();

        let load = sync.load_with(slow(vec![1]));
        let rejected = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            sync.reject(SyncError::Precondition("Quantity must be at least 1".to_string()))
        };
        let (loaded, rejected) = tokio::join!(load, rejected);

        loaded.unwrap();
        assert!(rejected.is_err());
        assert_eq!(sync.snapshot(), vec![1]);
        assert_eq!(
            sync.status(),
            SyncStatus::Error("Quantity must be at least 1".to_string())
        );

        sync.load_with(async { Ok(vec![1]) }).await.unwrap();
        assert_eq!(sync.status(), SyncStatus::Idle);
    }
}
