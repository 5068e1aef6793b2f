//! Conversion from wire records to domain types.
//!
//! Required fields that are missing, and values that break a domain
//! invariant (zero quantity, negative price), reject the whole response with
//! [`GatewayError::Malformed`]. A snapshot is replaced whole or not at all.
//! Optional fields fall back to the defaults documented on the wire types.

use bazaar_core::{
    Cart, CartItem, CartItemId, CurrencyCode, DiscountPercent, Price, Product, ProductId,
    ProductSnapshot, Quantity, VariantId, Wishlist, WishlistItem,
};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::wire::{WireCart, WireCartItem, WireProduct, WireWishlistItem};
use crate::gateway::GatewayError;

fn malformed(what: impl Into<String>) -> GatewayError {
    let message = what.into();
    warn!(reason = %message, "Rejecting malformed Gateway response");
    GatewayError::Malformed(message)
}

fn currency(code: Option<&str>) -> Result<CurrencyCode, GatewayError> {
    code.map_or(Ok(CurrencyCode::default()), |c| {
        CurrencyCode::parse(c).map_err(|e| malformed(e.to_string()))
    })
}

fn price(amount: Option<Decimal>, code: CurrencyCode, owner: &str) -> Result<Price, GatewayError> {
    let amount = amount.ok_or_else(|| malformed(format!("{owner} has no price")))?;
    Price::non_negative(amount, code).map_err(|e| malformed(format!("{owner}: {e}")))
}

fn discount(raw: Option<Decimal>, owner: &str) -> DiscountPercent {
    let discount = DiscountPercent::new(raw.unwrap_or(Decimal::ZERO));
    if discount.is_out_of_range() {
        warn!(
            product = %owner,
            discount = %discount.raw(),
            "Discount outside 0-100%, clamping"
        );
    }
    discount
}

// =============================================================================
// Products
// =============================================================================

/// Convert a catalog product.
pub fn convert_product(product: WireProduct) -> Result<Product, GatewayError> {
    let id = product
        .id
        .ok_or_else(|| malformed("product has no id"))?;
    let owner = format!("product {id}");
    let name = product
        .name
        .ok_or_else(|| malformed(format!("{owner} has no name")))?;
    let code = currency(product.currency.as_deref())?;
    let stock = product
        .stock
        .map(|units| {
            u32::try_from(units).map_err(|_| malformed(format!("{owner} has stock {units}")))
        })
        .transpose()?;

    Ok(Product {
        price: price(product.price, code, &owner)?,
        discount: discount(product.discount, &owner),
        id: ProductId::new(id),
        name,
        description: product.description,
        images: product.images.unwrap_or_default(),
        category: product.category,
        stock,
        vendor: product.vendor_name,
    })
}

/// Convert a product embedded in a cart line or wishlist entry.
///
/// `fallback_id` is the record's own `product_id`, used when the embedded
/// product omits its ID.
fn convert_snapshot(
    product: Option<WireProduct>,
    fallback_id: Option<String>,
    owner: &str,
) -> Result<ProductSnapshot, GatewayError> {
    let mut product = product.ok_or_else(|| malformed(format!("{owner} has no product")))?;
    if product.id.is_none() {
        product.id = fallback_id;
    }
    convert_product(product).map(|p| p.snapshot())
}

// =============================================================================
// Cart
// =============================================================================

fn convert_cart_item(item: WireCartItem) -> Result<CartItem, GatewayError> {
    let id = item.id.ok_or_else(|| malformed("cart item has no id"))?;
    let owner = format!("cart item {id}");

    let raw_quantity = item
        .quantity
        .ok_or_else(|| malformed(format!("{owner} has no quantity")))?;
    let quantity =
        Quantity::try_from(raw_quantity).map_err(|e| malformed(format!("{owner}: {e}")))?;

    let product = convert_snapshot(item.product, item.product_id, &owner)?;

    let line_total = match item.line_total {
        Some(amount) => Price::non_negative(amount, product.price.currency_code)
            .map_err(|e| malformed(format!("{owner}: {e}")))?,
        None => product.effective_price().times(quantity.get()),
    };

    Ok(CartItem {
        id: CartItemId::new(id),
        variant_id: item.variant_id.map(VariantId::new),
        product,
        quantity,
        line_total,
    })
}

/// Convert a cart. `None` means the session has no cart yet.
pub fn convert_cart(cart: Option<WireCart>) -> Result<Cart, GatewayError> {
    let Some(cart) = cart else {
        return Ok(Cart::default());
    };

    let items = cart
        .items
        .unwrap_or_default()
        .into_iter()
        .map(convert_cart_item)
        .collect::<Result<Vec<_>, _>>()?;

    let code = match cart.currency.as_deref() {
        Some(code) => currency(Some(code))?,
        None => items
            .first()
            .map_or_else(CurrencyCode::default, |i| i.line_total.currency_code),
    };

    let total_amount = if let Some(amount) = cart.total_amount {
        Price::non_negative(amount, code).map_err(|e| malformed(format!("cart total: {e}")))?
    } else {
        debug!("Cart response has no total_amount, summing line totals");
        Price::new(items.iter().map(|i| i.line_total.amount).sum(), code)
    };

    Ok(Cart {
        items,
        total_amount,
    })
}

// =============================================================================
// Wishlist
// =============================================================================

/// Convert a wishlist. `None` means nothing has been saved yet.
pub fn convert_wishlist(items: Option<Vec<WireWishlistItem>>) -> Result<Wishlist, GatewayError> {
    let items = items
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            Ok(WishlistItem {
                product: convert_snapshot(item.product, item.product_id, "wishlist item")?,
                added_at: item.created_at,
            })
        })
        .collect::<Result<Vec<_>, GatewayError>>()?;

    let (wishlist, duplicates) = Wishlist::from_items(items);
    if !duplicates.is_empty() {
        warn!(
            duplicates = ?duplicates,
            "Wishlist response repeated products, keeping first occurrence"
        );
    }
    Ok(wishlist)
}
