//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for the storefront's domain
//! concepts and the pure aggregates derived from them.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;
pub mod quantity;
pub mod wishlist;

pub use cart::{Cart, CartItem};
pub use id::*;
pub use price::{CurrencyCode, DiscountPercent, Price, PriceError};
pub use product::{Product, ProductQuery, ProductSnapshot};
pub use quantity::{Quantity, QuantityError};
pub use wishlist::{Wishlist, WishlistItem};
