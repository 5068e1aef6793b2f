//! Cart types and their derived aggregates.

use serde::{Deserialize, Serialize};

use super::id::{CartItemId, ProductId, VariantId};
use super::price::{CurrencyCode, Price};
use super::product::ProductSnapshot;
use super::quantity::Quantity;

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Gateway-issued line ID, used for update and remove.
    pub id: CartItemId,
    /// Product as priced at read time.
    pub product: ProductSnapshot,
    /// Selected variant, if the product has variants.
    pub variant_id: Option<VariantId>,
    /// Units on this line.
    pub quantity: Quantity,
    /// This line's contribution to the cart total.
    pub line_total: Price,
}

/// A shopping cart owned by a user or anonymous session.
///
/// Ownership and lifetime are managed by the Gateway. The total is computed
/// server-side and trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Lines in display order.
    pub items: Vec<CartItem>,
    /// Server-computed total.
    pub total_amount: Price,
}

impl Default for Cart {
    fn default() -> Self {
        Self::empty(CurrencyCode::default())
    }
}

impl Cart {
    /// A cart with no lines.
    #[must_use]
    pub const fn empty(currency_code: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            total_amount: Price::zero(currency_code),
        }
    }

    /// The server-computed total.
    #[must_use]
    pub const fn total(&self) -> Price {
        self.total_amount
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a line by its ID.
    #[must_use]
    pub fn item(&self, id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Find the first line holding a product (any variant).
    #[must_use]
    pub fn item_for_product(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product.id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::DiscountPercent;

    fn item(id: &str, product: &str, qty: u32) -> CartItem {
        let price = Price::new(dec!(10), CurrencyCode::USD);
        CartItem {
            id: CartItemId::new(id),
            product: ProductSnapshot {
                id: ProductId::new(product),
                name: product.to_string(),
                price,
                discount: DiscountPercent::NONE,
                image_url: None,
                in_stock: true,
            },
            variant_id: None,
            quantity: Quantity::new(qty).unwrap_or_default(),
            line_total: price.times(qty),
        }
    }

    #[test]
    fn test_item_count_and_total_quantity() {
        let cart = Cart {
            items: vec![item("l1", "p1", 2), item("l2", "p2", 3)],
            total_amount: Price::new(dec!(50), CurrencyCode::USD),
        };

        assert_eq!(cart.item_count(), 2);
        assert_eq!(cart.total_quantity(), 5);
        assert_eq!(cart.total().amount, dec!(50));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::default();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.total_quantity(), 0);
        assert_eq!(cart.total().amount, dec!(0));
    }

    #[test]
    fn test_lookup() {
        let cart = Cart {
            items: vec![item("l1", "p1", 1), item("l2", "p2", 1)],
            total_amount: Price::new(dec!(20), CurrencyCode::USD),
        };

        assert_eq!(
            cart.item(&CartItemId::new("l2")).map(|i| i.product.id.as_str()),
            Some("p2")
        );
        assert_eq!(
            cart.item_for_product(&ProductId::new("p1"))
                .map(|i| i.id.as_str()),
            Some("l1")
        );
        assert!(cart.item(&CartItemId::new("missing")).is_none());
    }
}
