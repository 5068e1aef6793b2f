//! Product types.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::{DiscountPercent, Price};

/// The slice of a product embedded in cart and wishlist records.
///
/// This is a copy taken by the Gateway at read time, not a live reference to
/// the catalog; prices shown in the cart come from here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// List price per unit.
    pub price: Price,
    /// Percentage discount off the list price.
    pub discount: DiscountPercent,
    /// Primary image URL.
    pub image_url: Option<String>,
    /// Whether the product can currently be purchased.
    pub in_stock: bool,
}

impl ProductSnapshot {
    /// Unit price after the discount.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        self.price.discounted(self.discount)
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Long description.
    pub description: Option<String>,
    /// List price per unit.
    pub price: Price,
    /// Percentage discount off the list price.
    pub discount: DiscountPercent,
    /// Image URLs, primary first.
    pub images: Vec<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Units in stock, or `None` when inventory is not tracked.
    pub stock: Option<u32>,
    /// Selling vendor's display name.
    pub vendor: Option<String>,
}

impl Product {
    /// Whether at least one unit is available. Untracked inventory counts
    /// as available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        match self.stock {
            Some(units) => units > 0,
            None => true,
        }
    }

    /// Reduce to the snapshot shape used by carts and wishlists.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            discount: self.discount,
            image_url: self.images.first().cloned(),
            in_stock: self.in_stock(),
        }
    }
}

/// Filters for a catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductQuery {
    /// Free-text search over names and descriptions.
    pub search: Option<String>,
    /// Restrict to one category.
    pub category: Option<String>,
    /// Maximum number of products to return.
    pub limit: Option<u32>,
}

impl ProductQuery {
    /// Whether this query applies no filters at all.
    #[must_use]
    pub const fn is_unfiltered(&self) -> bool {
        self.search.is_none() && self.category.is_none()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::CurrencyCode;

    #[test]
    fn test_snapshot_takes_first_image() {
        let product = Product {
            id: ProductId::new("p1"),
            name: "Mango Pickle".to_string(),
            description: None,
            price: Price::new(dec!(12), CurrencyCode::INR),
            discount: DiscountPercent::new(dec!(25)),
            images: vec!["a.jpg".to_string(), "b.jpg".to_string()],
            category: Some("pantry".to_string()),
            stock: Some(0),
            vendor: None,
        };

        let snapshot = product.snapshot();
        assert_eq!(snapshot.image_url.as_deref(), Some("a.jpg"));
        assert!(!snapshot.in_stock);
        assert_eq!(snapshot.effective_price().amount, dec!(9));
    }

    #[test]
    fn test_query_unfiltered() {
        assert!(ProductQuery::default().is_unfiltered());
        let limited = ProductQuery {
            limit: Some(10),
            ..ProductQuery::default()
        };
        assert!(limited.is_unfiltered());
        let searched = ProductQuery {
            search: Some("tea".to_string()),
            ..ProductQuery::default()
        };
        assert!(!searched.is_unfiltered());
    }
}
