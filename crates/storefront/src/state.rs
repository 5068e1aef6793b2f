//! Storefront state shared across the presentation layer.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::gateway::{CartGateway, CatalogGateway, GatewayError, RestGateway, WishlistGateway};
use crate::notify::{Notice, Notifier};
use crate::sync::{CartSync, WishlistSync};

/// One user session's view of the store.
///
/// Owns one cart mirror, one wishlist mirror, the catalog cache, and the
/// notice channel they publish to. Cheaply cloneable via `Arc`; build one per
/// mounted storefront and pass clones to whatever renders it.
pub struct Storefront<G> {
    inner: Arc<StorefrontInner<G>>,
}

struct StorefrontInner<G> {
    cart: CartSync<G>,
    wishlist: WishlistSync<G>,
    catalog: Catalog<G>,
    notifier: Notifier,
}

impl<G> Clone for Storefront<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G> Storefront<G>
where
    G: CartGateway + WishlistGateway + CatalogGateway + Clone,
{
    /// Create the storefront state. Nothing is read until
    /// [`load`](Self::load) or an individual mirror's `load`.
    #[must_use]
    pub fn new(gateway: G, config: &StorefrontConfig) -> Self {
        let notifier = Notifier::new();
        let timeout = config.gateway.request_timeout;

        Self {
            inner: Arc::new(StorefrontInner {
                cart: CartSync::new(gateway.clone(), notifier.clone(), timeout),
                wishlist: WishlistSync::new(gateway.clone(), notifier.clone(), timeout),
                catalog: Catalog::new(gateway, &config.catalog, timeout),
                notifier,
            }),
        }
    }

    /// Get a reference to the cart mirror.
    #[must_use]
    pub fn cart(&self) -> &CartSync<G> {
        &self.inner.cart
    }

    /// Get a reference to the wishlist mirror.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistSync<G> {
        &self.inner.wishlist
    }

    /// Get a reference to the catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &Catalog<G> {
        &self.inner.catalog
    }

    /// Receive every notice published from now on.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notifier.subscribe()
    }

    /// Read the cart and the wishlist concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the other read still completes and each
    /// mirror records its own outcome.
    pub async fn load(&self) -> Result<()> {
        let (cart, wishlist) = tokio::join!(self.inner.cart.load(), self.inner.wishlist.load());
        cart.and(wishlist)
    }

    /// Cancel every in-flight call. Every later operation fails with
    /// [`SyncError::Cancelled`](crate::SyncError::Cancelled) without
    /// contacting the Gateway.
    pub fn teardown(&self) {
        info!("Tearing down storefront state");
        self.inner.cart.teardown();
        self.inner.wishlist.teardown();
        self.inner.catalog.teardown();
    }
}

impl Storefront<RestGateway> {
    /// Create storefront state talking to the remote Gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built from `config`.
    pub fn connect(config: &StorefrontConfig) -> std::result::Result<Self, GatewayError> {
        let gateway = RestGateway::new(&config.gateway)?;
        info!(base_url = %config.gateway.base_url, "Connecting storefront");
        Ok(Self::new(gateway, config))
    }
}
