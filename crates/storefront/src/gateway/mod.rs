//! Remote Data Gateway clients.
//!
//! # Architecture
//!
//! - The Gateway is the source of truth for carts, wishlists, and products -
//!   this crate never merges local edits, it only re-reads
//! - One trait per collection so synchronizers depend on exactly the calls
//!   they make
//! - [`RestGateway`] talks JSON over HTTP via `reqwest`
//! - [`MemoryGateway`] keeps everything in-process, with programmable
//!   failures and latency
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_storefront::gateway::{CartGateway, RestGateway};
//!
//! let gateway = RestGateway::new(&config.gateway)?;
//! gateway.add_cart_item(&product_id, Quantity::ONE, None).await?;
//! let cart = gateway.fetch_cart().await?;
//! ```

mod memory;
mod rest;

use std::future::Future;
use std::time::Duration;

use bazaar_core::{Cart, CartItemId, Product, ProductId, ProductQuery, Quantity, VariantId, Wishlist};
use thiserror::Error;

pub use memory::MemoryGateway;
pub use rest::RestGateway;

/// Errors that can occur when talking to the Gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never completed (DNS, connect, reset, TLS).
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),

    /// No response within the configured timeout.
    #[error("Gateway request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Rate limited by the Gateway.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The Gateway answered but refused the operation
    /// (out of stock, invalid quantity, ...).
    #[error("Gateway rejected request{}: {message}", format_status(.status))]
    Rejected {
        /// HTTP status, when the Gateway is remote.
        status: Option<u16>,
        /// Application-level message from the Gateway.
        message: String,
    },

    /// Response decoded but violated the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Response body was not valid JSON for the expected type.
    #[error("JSON parse error: {0}")]
    Parse(String),
}

impl GatewayError {
    /// Whether the failure happened below the application layer.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }

    /// Shorthand for an application-level rejection without a status code.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            message: message.into(),
        }
    }
}

#[allow(clippy::ref_option)]
fn format_status(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |s| format!(" (HTTP {s})"))
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Cart reads and writes.
///
/// Writes return only success or failure; the caller re-reads the cart.
pub trait CartGateway: Send + Sync {
    /// Read the current cart. A session with no cart yet reads as empty.
    fn fetch_cart(&self) -> impl Future<Output = Result<Cart, GatewayError>> + Send;

    /// Append a product (optionally a specific variant) to the cart.
    fn add_cart_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
        variant_id: Option<&VariantId>,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Set the quantity of an existing line.
    fn update_cart_item(
        &self,
        item_id: &CartItemId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Delete a line.
    fn remove_cart_item(
        &self,
        item_id: &CartItemId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Delete every line.
    fn clear_cart(&self) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Wishlist reads and writes.
pub trait WishlistGateway: Send + Sync {
    /// Read the current wishlist.
    fn fetch_wishlist(&self) -> impl Future<Output = Result<Wishlist, GatewayError>> + Send;

    /// Save a product.
    fn add_wishlist_item(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Unsave a product.
    fn remove_wishlist_item(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// Catalog reads.
pub trait CatalogGateway: Send + Sync {
    /// Read one product.
    fn fetch_product(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Product, GatewayError>> + Send;

    /// List products matching a query.
    fn fetch_products(
        &self,
        query: &ProductQuery,
    ) -> impl Future<Output = Result<Vec<Product>, GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::NotFound("product p-123".to_string());
        assert_eq!(err.to_string(), "Not found: product p-123");
    }

    #[test]
    fn test_rejected_display_with_and_without_status() {
        let err = GatewayError::Rejected {
            status: Some(422),
            message: "Out of stock".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Gateway rejected request (HTTP 422): Out of stock"
        );

        let err = GatewayError::rejected("Out of stock");
        assert_eq!(err.to_string(), "Gateway rejected request: Out of stock");
    }

    #[test]
    fn test_timeout_display() {
        let err = GatewayError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Gateway request timed out after 1500ms");
    }

    #[test]
    fn test_transport_classification() {
        assert!(GatewayError::Unreachable("connection refused".to_string()).is_transport());
        assert!(GatewayError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!GatewayError::RateLimited(5).is_transport());
        assert!(!GatewayError::rejected("nope").is_transport());
        assert!(!GatewayError::Malformed("missing id".to_string()).is_transport());
    }

    #[test]
    fn test_parse_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").err();
        let err = json_err.map(GatewayError::from);
        assert!(matches!(err, Some(GatewayError::Parse(_))));
    }
}
