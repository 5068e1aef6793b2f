//! Cart mirror.

use std::time::Duration;

use bazaar_core::{Cart, CartItemId, Price, ProductId, Quantity, VariantId};
use tokio::sync::watch;
use tracing::instrument;

use super::{SyncState, SyncStatus, Synchronizer};
use crate::error::Result;
use crate::gateway::CartGateway;
use crate::notify::Notifier;

/// Client-side mirror of the session's cart.
#[derive(Debug)]
pub struct CartSync<G> {
    gateway: G,
    sync: Synchronizer<Cart>,
}

impl<G: CartGateway> CartSync<G> {
    /// Create an empty mirror. Nothing is read until [`load`](Self::load).
    #[must_use]
    pub fn new(gateway: G, notifier: Notifier, timeout: Duration) -> Self {
        Self {
            gateway,
            sync: Synchronizer::new("cart", Cart::default(), notifier, timeout),
        }
    }

    /// The shared synchronizer core, for lifecycle and raw state access.
    #[must_use]
    pub const fn synchronizer(&self) -> &Synchronizer<Cart> {
        &self.sync
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Re-read the cart from the Gateway.
    ///
    /// # Errors
    ///
    /// Returns the read failure; the last good cart is kept.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<()> {
        self.sync.load_with(self.gateway.fetch_cart()).await
    }

    /// Add `quantity` units (default 1) of a product.
    ///
    /// # Errors
    ///
    /// Returns an error if `quantity` is 0 or the Gateway refuses the write.
    #[instrument(skip_all, fields(product_id = %product_id))]
    pub async fn add(&self, product_id: &ProductId, quantity: Option<u32>) -> Result<()> {
        self.add_line(product_id, None, quantity).await
    }

    /// Add `quantity` units (default 1) of a specific product variant.
    ///
    /// # Errors
    ///
    /// Returns an error if `quantity` is 0 or the Gateway refuses the write.
    #[instrument(skip_all, fields(product_id = %product_id, variant_id = %variant_id))]
    pub async fn add_variant(
        &self,
        product_id: &ProductId,
        variant_id: &VariantId,
        quantity: Option<u32>,
    ) -> Result<()> {
        self.add_line(product_id, Some(variant_id), quantity).await
    }

    /// Set a line's quantity. Use [`remove`](Self::remove) to delete a line;
    /// a quantity of 0 is refused without contacting the Gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if `quantity` is 0 or the Gateway refuses the write.
    #[instrument(skip_all, fields(item_id = %item_id))]
    pub async fn update(&self, item_id: &CartItemId, quantity: u32) -> Result<()> {
        let quantity = match Quantity::new(quantity) {
            Ok(q) => q,
            Err(err) => return self.sync.reject(err.into()),
        };

        self.sync
            .mutate_with(
                "update",
                "Cart updated",
                self.gateway.update_cart_item(item_id, quantity),
                || self.gateway.fetch_cart(),
            )
            .await
    }

    /// Delete a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gateway refuses the write.
    #[instrument(skip_all, fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: &CartItemId) -> Result<()> {
        self.sync
            .mutate_with(
                "remove",
                "Removed from cart",
                self.gateway.remove_cart_item(item_id),
                || self.gateway.fetch_cart(),
            )
            .await
    }

    /// Delete every line.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gateway refuses the write.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        self.sync
            .mutate_with(
                "clear",
                "Cart cleared",
                self.gateway.clear_cart(),
                || self.gateway.fetch_cart(),
            )
            .await
    }

    async fn add_line(
        &self,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: Option<u32>,
    ) -> Result<()> {
        let quantity = match quantity.map_or(Ok(Quantity::ONE), Quantity::new) {
            Ok(q) => q,
            Err(err) => return self.sync.reject(err.into()),
        };

        self.sync
            .mutate_with(
                "add",
                "Added to cart",
                self.gateway.add_cart_item(product_id, quantity, variant_id),
                || self.gateway.fetch_cart(),
            )
            .await
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    /// A copy of the current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.sync.snapshot()
    }

    /// Cart total as reported by the Gateway.
    #[must_use]
    pub fn total(&self) -> Price {
        self.sync.with_snapshot(Cart::total)
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.sync.with_snapshot(Cart::item_count)
    }

    /// Units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.sync.with_snapshot(Cart::total_quantity)
    }

    /// Whether any cart call is in flight.
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

    /// Watch the cart state; the receiver wakes on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState<Cart>> {
        self.sync.subscribe()
    }

    /// Cancel in-flight calls and refuse new ones.
    pub fn teardown(&self) {
        self.sync.teardown();
    }
}
