//! In-process Gateway.
//!
//! Holds products, one cart, and one wishlist behind an async mutex and
//! applies the same business rules the remote Gateway does (stock limits,
//! unknown products, set semantics for the wishlist). Failures and latency
//! can be scripted per call, which is how the synchronizer's error and race
//! handling is exercised without a network.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{
    Cart, CartItem, CartItemId, CurrencyCode, Price, Product, ProductId, ProductQuery, Quantity,
    VariantId, Wishlist, WishlistItem,
};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CartGateway, CatalogGateway, GatewayError, WishlistGateway};

/// Number of calls a [`MemoryGateway`] has served, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Cart and wishlist reads.
    pub reads: usize,
    /// Cart and wishlist writes.
    pub writes: usize,
    /// Catalog reads.
    pub catalog_reads: usize,
}

#[derive(Debug, Clone, Copy)]
enum CallKind {
    Read,
    Write,
    Catalog,
}

#[derive(Debug, Clone)]
struct Line {
    id: CartItemId,
    product_id: ProductId,
    variant_id: Option<VariantId>,
    quantity: Quantity,
}

#[derive(Debug, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    lines: Vec<Line>,
    wishlist: Vec<(ProductId, DateTime<Utc>)>,
    next_line: u64,
    read_failures: VecDeque<GatewayError>,
    write_failures: VecDeque<GatewayError>,
    read_delays: VecDeque<Duration>,
    latency: Duration,
    calls: CallCounts,
}

impl MemoryState {
    fn product(&self, id: &ProductId) -> Result<&Product, GatewayError> {
        self.products
            .get(id)
            .ok_or_else(|| GatewayError::NotFound(format!("Product not found: {id}")))
    }

    fn check_stock(&self, product_id: &ProductId, wanted: u32) -> Result<(), GatewayError> {
        let product = self.product(product_id)?;
        match product.stock {
            Some(available) if wanted > available => Err(GatewayError::rejected(format!(
                "Only {available} of {} left in stock",
                product.name
            ))),
            _ => Ok(()),
        }
    }

    fn cart(&self) -> Cart {
        let items: Vec<CartItem> = self
            .lines
            .iter()
            .filter_map(|line| {
                let product = self.products.get(&line.product_id)?.snapshot();
                let line_total = product.effective_price().times(line.quantity.get());
                Some(CartItem {
                    id: line.id.clone(),
                    product,
                    variant_id: line.variant_id.clone(),
                    quantity: line.quantity,
                    line_total,
                })
            })
            .collect();

        let currency = items
            .first()
            .map_or_else(CurrencyCode::default, |i| i.line_total.currency_code);
        let total = items.iter().map(|i| i.line_total.amount).sum();

        Cart {
            items,
            total_amount: Price::new(total, currency),
        }
    }

    fn wishlist(&self) -> Wishlist {
        let items = self.wishlist.iter().filter_map(|(id, added_at)| {
            Some(WishlistItem {
                product: self.products.get(id)?.snapshot(),
                added_at: Some(*added_at),
            })
        });
        Wishlist::from_items(items).0
    }
}

/// In-process Gateway with scripted failures and latency.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryGateway {
    /// A Gateway whose catalog holds `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = MemoryState {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add or replace a catalog product.
    pub async fn upsert_product(&self, product: Product) {
        self.state
            .lock()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Make the next cart or wishlist read fail with `err`.
    pub async fn fail_next_read(&self, err: GatewayError) {
        self.state.lock().await.read_failures.push_back(err);
    }

    /// Make the next cart or wishlist write fail with `err`.
    pub async fn fail_next_write(&self, err: GatewayError) {
        self.state.lock().await.write_failures.push_back(err);
    }

    /// Delay the next cart or wishlist read by `delay`, on top of the base
    /// latency. The read still observes state as of when it was issued.
    pub async fn delay_next_read(&self, delay: Duration) {
        self.state.lock().await.read_delays.push_back(delay);
    }

    /// Base latency added to every call.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Calls served so far.
    pub async fn calls(&self) -> CallCounts {
        self.state.lock().await.calls
    }

    /// The cart as a fresh read would return it, without counting a call.
    pub async fn current_cart(&self) -> Cart {
        self.state.lock().await.cart()
    }

    /// The wishlist as a fresh read would return it, without counting a call.
    pub async fn current_wishlist(&self) -> Wishlist {
        self.state.lock().await.wishlist()
    }

    /// Record a call, returning the delay to apply or a scripted failure.
    async fn begin(&self, kind: CallKind) -> Result<Duration, GatewayError> {
        let mut state = self.state.lock().await;
        let failure = match kind {
            CallKind::Read => {
                state.calls.reads += 1;
                state.read_failures.pop_front()
            }
            CallKind::Write => {
                state.calls.writes += 1;
                state.write_failures.pop_front()
            }
            CallKind::Catalog => {
                state.calls.catalog_reads += 1;
                None
            }
        };
        if let Some(err) = failure {
            return Err(err);
        }

        let extra = match kind {
            CallKind::Read => state.read_delays.pop_front().unwrap_or_default(),
            CallKind::Write | CallKind::Catalog => Duration::ZERO,
        };
        Ok(state.latency + extra)
    }

    /// Run a read: capture state now, deliver it after the delay.
    async fn read<T>(
        &self,
        kind: CallKind,
        view: impl FnOnce(&MemoryState) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let delay = self.begin(kind).await?;
        let value = view(&*self.state.lock().await);
        pause(delay).await;
        value
    }

    /// Run a write: wait out the delay, then apply.
    async fn write(
        &self,
        apply: impl FnOnce(&mut MemoryState) -> Result<(), GatewayError>,
    ) -> Result<(), GatewayError> {
        let delay = self.begin(CallKind::Write).await?;
        pause(delay).await;
        apply(&mut *self.state.lock().await)
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl CartGateway for MemoryGateway {
    async fn fetch_cart(&self) -> Result<Cart, GatewayError> {
        self.read(CallKind::Read, |state| Ok(state.cart())).await
    }

    async fn add_cart_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
        variant_id: Option<&VariantId>,
    ) -> Result<(), GatewayError> {
        self.write(|state| {
            let existing = state
                .lines
                .iter()
                .position(|l| &l.product_id == product_id && l.variant_id.as_ref() == variant_id);

            let already = existing
                .and_then(|i| state.lines.get(i))
                .map_or(0, |l| l.quantity.get());
            let wanted = already.saturating_add(quantity.get());
            state.check_stock(product_id, wanted)?;
            let wanted = Quantity::new(wanted).map_err(|e| GatewayError::rejected(e.to_string()))?;

            if let Some(line) = existing.and_then(|i| state.lines.get_mut(i)) {
                line.quantity = wanted;
            } else {
                state.next_line += 1;
                let id = CartItemId::new(format!("line-{}", state.next_line));
                state.lines.push(Line {
                    id,
                    product_id: product_id.clone(),
                    variant_id: variant_id.cloned(),
                    quantity: wanted,
                });
            }
            Ok(())
        })
        .await
    }

    async fn update_cart_item(
        &self,
        item_id: &CartItemId,
        quantity: Quantity,
    ) -> Result<(), GatewayError> {
        self.write(|state| {
            let product_id = state
                .lines
                .iter()
                .find(|l| &l.id == item_id)
                .map(|l| l.product_id.clone())
                .ok_or_else(|| GatewayError::NotFound(format!("Cart item not found: {item_id}")))?;
            state.check_stock(&product_id, quantity.get())?;

            if let Some(line) = state.lines.iter_mut().find(|l| &l.id == item_id) {
                line.quantity = quantity;
            }
            Ok(())
        })
        .await
    }

    async fn remove_cart_item(&self, item_id: &CartItemId) -> Result<(), GatewayError> {
        self.write(|state| {
            let before = state.lines.len();
            state.lines.retain(|l| &l.id != item_id);
            if state.lines.len() == before {
                return Err(GatewayError::NotFound(format!(
                    "Cart item not found: {item_id}"
                )));
            }
            Ok(())
        })
        .await
    }

    async fn clear_cart(&self) -> Result<(), GatewayError> {
        self.write(|state| {
            state.lines.clear();
            Ok(())
        })
        .await
    }
}

impl WishlistGateway for MemoryGateway {
    async fn fetch_wishlist(&self) -> Result<Wishlist, GatewayError> {
        self.read(CallKind::Read, |state| Ok(state.wishlist())).await
    }

    async fn add_wishlist_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        self.write(|state| {
            state.product(product_id)?;
            if !state.wishlist.iter().any(|(id, _)| id == product_id) {
                state.wishlist.push((product_id.clone(), Utc::now()));
            }
            Ok(())
        })
        .await
    }

    async fn remove_wishlist_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        self.write(|state| {
            state.wishlist.retain(|(id, _)| id != product_id);
            Ok(())
        })
        .await
    }
}

impl CatalogGateway for MemoryGateway {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<Product, GatewayError> {
        self.read(CallKind::Catalog, |state| state.product(product_id).cloned())
            .await
    }

    async fn fetch_products(&self, query: &ProductQuery) -> Result<Vec<Product>, GatewayError> {
        self.read(CallKind::Catalog, |state| {
            let search = query.search.as_deref().map(str::to_lowercase);
            let limit = query
                .limit
                .and_then(|l| usize::try_from(l).ok())
                .unwrap_or(usize::MAX);

            Ok(state
                .products
                .values()
                .filter(|p| {
                    query
                        .category
                        .as_ref()
                        .is_none_or(|c| p.category.as_ref() == Some(c))
                })
                .filter(|p| {
                    search.as_ref().is_none_or(|s| {
                        p.name.to_lowercase().contains(s)
                            || p.description
                                .as_ref()
                                .is_some_and(|d| d.to_lowercase().contains(s))
                    })
                })
                .take(limit)
                .cloned()
                .collect())
        })
        .await
    }
}
