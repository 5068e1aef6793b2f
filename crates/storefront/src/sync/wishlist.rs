//! Wishlist mirror.

use std::time::Duration;

use bazaar_core::{ProductId, Wishlist};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::instrument;

use super::{SyncState, SyncStatus, Synchronizer};
use crate::error::Result;
use crate::gateway::WishlistGateway;
use crate::notify::Notifier;

/// What a [`WishlistSync::toggle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Added,
    Removed,
}

/// Client-side mirror of the session's wishlist.
#[derive(Debug)]
pub struct WishlistSync<G> {
    gateway: G,
    sync: Synchronizer<Wishlist>,
}

impl<G: WishlistGateway> WishlistSync<G> {
    /// Create an empty mirror. Nothing is read until [`load`](Self::load).
    #[must_use]
    pub fn new(gateway: G, notifier: Notifier, timeout: Duration) -> Self {
        Self {
            gateway,
            sync: Synchronizer::new("wishlist", Wishlist::default(), notifier, timeout),
        }
    }

    /// The shared synchronizer core, for lifecycle and raw state access.
    #[must_use]
    pub const fn synchronizer(&self) -> &Synchronizer<Wishlist> {
        &self.sync
    }

    /// Re-read the wishlist from the Gateway.
    ///
    /// # Errors
    ///
    /// Returns the read failure; the last good wishlist is kept.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<()> {
        self.sync.load_with(self.gateway.fetch_wishlist()).await
    }

    /// Save a product. Saving an already saved product is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gateway refuses the write.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: &ProductId) -> Result<()> {
        self.sync
            .mutate_with(
                "add",
                "Saved to wishlist",
                self.gateway.add_wishlist_item(product_id),
                || self.gateway.fetch_wishlist(),
            )
            .await
    }

    /// Unsave a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gateway refuses the write.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<()> {
        self.sync
            .mutate_with(
                "remove",
                "Removed from wishlist",
                self.gateway.remove_wishlist_item(product_id),
                || self.gateway.fetch_wishlist(),
            )
            .await
    }

    /// Remove the product if the local snapshot has it, add it otherwise.
    ///
    /// The decision uses local state and is not atomic with the write: two
    /// rapid toggles issued before the first re-read lands may both choose
    /// the same direction. Callers that care should disable the control
    /// while [`is_loading`](Self::is_loading) is true.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gateway refuses the write.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn toggle(&self, product_id: &ProductId) -> Result<Toggled> {
        if self.is_in_wishlist(product_id) {
            self.remove(product_id).await.map(|()| Toggled::Removed)
        } else {
            self.add(product_id).await.map(|()| Toggled::Added)
        }
    }

    /// A copy of the current wishlist.
    #[must_use]
    pub fn wishlist(&self) -> Wishlist {
        self.sync.snapshot()
    }

    /// Number of saved products.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.sync.with_snapshot(Wishlist::item_count)
    }

    /// Sum of discounted unit prices of every saved product.
    #[must_use]
    pub fn total_value(&self) -> Decimal {
        self.sync.with_snapshot(Wishlist::total_value)
    }

    /// Whether `product_id` is saved.
    #[must_use]
    pub fn is_in_wishlist(&self, product_id: &ProductId) -> bool {
        self.sync.with_snapshot(|w| w.contains(product_id))
    }

    /// Whether any wishlist call is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.sync.is_loading()
    }

    /// The persistent inline error, if the last call failed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.sync.error()
    }

    /// Current coarse status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.sync.status()
    }

    /// Watch the wishlist state; the receiver wakes on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState<Wishlist>> {
        self.sync.subscribe()
    }

    /// Cancel in-flight calls and refuse new ones.
    pub fn teardown(&self) {
        self.sync.teardown();
    }
}
