//! Wishlist types and their derived aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::ProductSnapshot;

/// A product saved to the wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    /// Product as priced at read time.
    pub product: ProductSnapshot,
    /// When the product was saved, if the Gateway reports it.
    pub added_at: Option<DateTime<Utc>>,
}

/// A set of saved products, in display order.
///
/// Membership is by product identity: a product is either in the wishlist or
/// not. Use [`Wishlist::from_items`] to build one from untrusted input; it
/// drops repeated products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
}

impl Wishlist {
    /// Build a wishlist, keeping the first occurrence of each product.
    ///
    /// Returns the wishlist and the IDs of any dropped duplicates.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = WishlistItem>) -> (Self, Vec<ProductId>) {
        let mut kept: Vec<WishlistItem> = Vec::new();
        let mut duplicates = Vec::new();

        for item in items {
            if kept.iter().any(|k| k.product.id == item.product.id) {
                duplicates.push(item.product.id);
            } else {
                kept.push(item);
            }
        }

        (Self { items: kept }, duplicates)
    }

    /// Items in display order.
    #[must_use]
    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    /// Number of saved products.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether `product_id` is saved.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|item| &item.product.id == product_id)
    }

    /// Sum of `price * (1 - discount / 100)` over all items.
    ///
    /// Discounts outside `[0, 100]` are clamped. Items are summed regardless
    /// of currency; the Gateway prices a wishlist in one currency.
    #[must_use]
    pub fn total_value(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.product.effective_price().amount)
            .sum()
    }
}
