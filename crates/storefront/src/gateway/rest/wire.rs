//! JSON shapes exchanged with the Gateway REST API.
//!
//! Every response field is optional on the wire. Which ones are actually
//! required, and the defaults for the rest, are decided in
//! [`super::conversions`], not here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Response envelope wrapping every Gateway payload.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Explicit outcome flag. Absent means success if the HTTP status was 2xx.
    pub success: Option<bool>,
    /// Payload.
    pub data: Option<T>,
    /// Human-readable status message.
    pub message: Option<String>,
    /// Human-readable failure reason.
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// The best available failure text.
    pub fn failure_message(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Product record, as embedded in carts and wishlists or listed by the catalog.
#[derive(Debug, Default, Deserialize)]
pub struct WireProduct {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    /// Percentage off `price`. Default: 0.
    pub discount: Option<Decimal>,
    /// ISO 4217 code. Default: USD.
    pub currency: Option<String>,
    /// Default: empty.
    pub images: Option<Vec<String>>,
    pub category: Option<String>,
    /// Absent means inventory is not tracked.
    pub stock: Option<i64>,
    pub vendor_name: Option<String>,
}

/// Cart line record.
#[derive(Debug, Default, Deserialize)]
pub struct WireCartItem {
    pub id: Option<String>,
    /// Used when the embedded product omits its own ID.
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
    pub quantity: Option<i64>,
    /// Default: discounted unit price times quantity.
    pub line_total: Option<Decimal>,
    pub product: Option<WireProduct>,
}

/// Cart record.
#[derive(Debug, Default, Deserialize)]
pub struct WireCart {
    /// Default: empty.
    pub items: Option<Vec<WireCartItem>>,
    /// Default: sum of line totals.
    pub total_amount: Option<Decimal>,
    /// Default: the first line's currency, else USD.
    pub currency: Option<String>,
}

/// Wishlist entry record.
#[derive(Debug, Default, Deserialize)]
pub struct WireWishlistItem {
    /// Used when the embedded product omits its own ID.
    pub product_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub product: Option<WireProduct>,
}

/// Body of `POST cart/items`.
#[derive(Debug, Serialize)]
pub struct AddCartItemRequest<'a> {
    pub product_id: &'a str,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<&'a str>,
}

/// Body of `PATCH cart/items/{id}`.
#[derive(Debug, Serialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

/// Body of `POST wishlist/items`.
#[derive(Debug, Serialize)]
pub struct AddWishlistItemRequest<'a> {
    pub product_id: &'a str,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let envelope: Envelope<WireCart> = serde_json::from_str("{}").unwrap_or(Envelope {
            success: Some(false),
            data: None,
            message: None,
            error: None,
        });
        assert!(envelope.success.is_none());
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_failure_message_prefers_error() {
        let envelope: Option<Envelope<serde::de::IgnoredAny>> = serde_json::from_str(
            r#"{"success": false, "message": "Request failed", "error": "Out of stock"}"#,
        )
        .ok();
        assert_eq!(
            envelope.as_ref().and_then(Envelope::failure_message),
            Some("Out of stock")
        );
    }

    #[test]
    fn test_prices_accept_numbers_and_strings() {
        let product: Option<WireProduct> =
            serde_json::from_str(r#"{"price": 12.5, "discount": "10"}"#).ok();
        let product = product.unwrap_or_default();
        assert_eq!(product.price, Some(dec!(12.5)));
        assert_eq!(product.discount, Some(dec!(10)));
    }

    #[test]
    fn test_add_request_omits_missing_variant() {
        let body = AddCartItemRequest {
            product_id: "p1",
            quantity: 2,
            variant_id: None,
        };
        let json = serde_json::to_string(&body).unwrap_or_default();
        assert_eq!(json, r#"{"product_id":"p1","quantity":2}"#);
    }
}
