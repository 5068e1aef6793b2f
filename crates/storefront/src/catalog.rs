//! Read-through product cache.
//!
//! Products change rarely compared to carts, so catalog reads are cached in
//! memory with a TTL. Listings are only cached when unfiltered; search
//! results go straight to the Gateway.

use std::time::Duration;

use bazaar_core::{Product, ProductId, ProductQuery};
use moka::future::Cache;
use tracing::{debug, instrument};

use crate::cancel::CancelToken;
use crate::config::CatalogConfig;
use crate::error::Result;
use crate::gateway::CatalogGateway;

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Product(ProductId),
    Products(ProductQuery),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(Vec<Product>),
}

/// Cached access to product data.
#[derive(Debug)]
pub struct Catalog<G> {
    gateway: G,
    cache: Cache<CacheKey, CacheValue>,
    cancel: CancelToken,
    timeout: Duration,
}

impl<G: CatalogGateway> Catalog<G> {
    #[must_use]
    pub fn new(gateway: G, config: &CatalogConfig, timeout: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();

        Self {
            gateway,
            cache,
            cancel: CancelToken::new(),
            timeout,
        }
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the Gateway call fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn product(&self, product_id: &ProductId) -> Result<Product> {
        let key = CacheKey::Product(product_id.clone());

        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product = self
            .cancel
            .guard(self.timeout, self.gateway.fetch_product(product_id))
            .await?;

        self.cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// List products matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the Gateway call fails.
    #[instrument(skip(self))]
    pub async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let key = CacheKey::Products(query.clone());
        let cacheable = query.is_unfiltered();

        if cacheable && let Some(CacheValue::Products(products)) = self.cache.get(&key).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products = self
            .cancel
            .guard(self.timeout, self.gateway.fetch_products(query))
            .await?;

        if cacheable {
            self.cache
                .insert(key, CacheValue::Products(products.clone()))
                .await;
        }

        Ok(products)
    }

    /// Drop a cached product so the next read goes to the Gateway.
    pub async fn invalidate_product(&self, product_id: &ProductId) {
        self.cache
            .invalidate(&CacheKey::Product(product_id.clone()))
            .await;
    }

    /// Drop everything cached.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Cancel in-flight reads and refuse new ones. Cached entries are still
    /// dropped on their own schedule.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }
}
