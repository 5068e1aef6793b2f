//! Integration tests for the Bazaar storefront client.
//!
//! The tests drive the real [`RestGateway`](bazaar_storefront::gateway::RestGateway)
//! against [`FakeGateway`], an in-process HTTP server speaking the Gateway's
//! JSON envelope protocol. Nothing external needs to be running.
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! The fake keeps one cart and one wishlist, enforces stock limits, records
//! every request it receives, and can be scripted to answer the next request
//! with an arbitrary status and body or to respond slowly.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use bazaar_storefront::config::{CatalogConfig, GatewayConfig, LogFormat, StorefrontConfig};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// API key the fake expects. Any other key is refused with 401.
pub const TEST_API_KEY: &str = "k9#Lm2$vQ8@zX4!pW7nR";

/// Path prefix the fake serves under, so base-path joining is exercised.
const BASE_PATH: &str = "/rest/v1";

/// A catalog product held by the fake.
#[derive(Debug, Clone)]
pub struct FakeProduct {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub category: Option<String>,
    pub stock: Option<i64>,
}

impl FakeProduct {
    #[must_use]
    pub fn new(id: &str, name: &str, price: Decimal) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            discount: Decimal::ZERO,
            category: None,
            stock: None,
        }
    }

    #[must_use]
    pub const fn with_discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    #[must_use]
    pub const fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    #[must_use]
    pub fn in_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "price": self.price.to_string(),
            "discount": self.discount.to_string(),
            "currency": "USD",
            "images": [format!("https://cdn.example.test/{}.jpg", self.id)],
            "category": self.category,
            "stock": self.stock,
            "vendor_name": "Fake Vendor",
        })
    }
}

/// A request as the fake received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub api_key: Option<String>,
    pub session_id: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug)]
struct ScriptedResponse {
    status: StatusCode,
    body: String,
    retry_after: Option<u64>,
}

#[derive(Debug)]
struct Line {
    id: String,
    product_id: String,
    variant_id: Option<String>,
    quantity: i64,
}

#[derive(Debug, Default)]
struct FakeState {
    products: Vec<FakeProduct>,
    lines: Vec<Line>,
    cart_started: bool,
    wishlist: Vec<String>,
    next_line: u64,
    requests: Vec<RecordedRequest>,
    scripted: VecDeque<ScriptedResponse>,
    latency: Duration,
}

impl FakeState {
    fn product(&self, id: &str) -> Option<&FakeProduct> {
        self.products.iter().find(|p| p.id == id)
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process HTTP Gateway for integration tests.
///
/// The server stops when the value is dropped.
pub struct FakeGateway {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl Drop for FakeGateway {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl FakeGateway {
    /// Start a fake on an ephemeral local port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start(products: impl IntoIterator<Item = FakeProduct>) -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            products: products.into_iter().collect(),
            ..FakeState::default()
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake gateway");
        let addr = listener
            .local_addr()
            .expect("Failed to read fake gateway address");

        let app = router(Arc::clone(&state));
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, task }
    }

    /// Base URL to configure clients with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}{BASE_PATH}", self.addr)
    }

    /// Client configuration pointing at this fake.
    ///
    /// # Panics
    ///
    /// Panics if the base URL is rejected, which would be a bug in the fake.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let mut gateway =
            GatewayConfig::new(&self.base_url(), SecretString::from(TEST_API_KEY))
                .expect("Fake gateway URL is valid");
        gateway.session_id = "session-under-test".to_string();
        gateway.request_timeout = Duration::from_secs(5);

        StorefrontConfig {
            gateway,
            catalog: CatalogConfig::default(),
            log_format: LogFormat::Pretty,
        }
    }

    /// Answer the next request with `status` and a JSON `body`.
    pub fn fail_next(&self, status: u16, body: &Value) {
        self.respond_next_raw(status, &body.to_string());
    }

    /// Answer the next request with `status` and a verbatim body.
    pub fn respond_next_raw(&self, status: u16, body: &str) {
        lock(&self.state).scripted.push_back(ScriptedResponse {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.to_string(),
            retry_after: None,
        });
    }

    /// Answer the next request with 429 and a `Retry-After` header.
    pub fn rate_limit_next(&self, retry_after: u64) {
        lock(&self.state).scripted.push_back(ScriptedResponse {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: json!({"success": false, "error": "Slow down"}).to_string(),
            retry_after: Some(retry_after),
        });
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    /// Every request received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Number of requests received so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Quantities in the server-side cart as `(product_id, quantity)`.
    #[must_use]
    pub fn cart_lines(&self) -> Vec<(String, i64)> {
        lock(&self.state)
            .lines
            .iter()
            .map(|l| (l.product_id.clone(), l.quantity))
            .collect()
    }
}

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/cart", get(fetch_cart))
        .route("/cart/items", delete(clear_cart).post(add_cart_item))
        .route(
            "/cart/items/{id}",
            patch(update_cart_item).delete(remove_cart_item),
        )
        .route("/wishlist", get(fetch_wishlist))
        .route("/wishlist/items", post(add_wishlist_item))
        .route("/wishlist/items/{product_id}", delete(remove_wishlist_item))
        .route("/products", get(fetch_products))
        .route("/products/{id}", get(fetch_product))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            record_and_script,
        ))
        .with_state(state);

    Router::new().nest(BASE_PATH, api)
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Record the request, then apply latency, auth, and any scripted response.
async fn record_and_script(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let headers = request.headers();
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        api_key: header_string(headers, "apikey"),
        session_id: header_string(headers, "x-session-id"),
        authorization: header_string(headers, "authorization"),
    };
    let authorized = recorded.api_key.as_deref() == Some(TEST_API_KEY);

    let (latency, scripted) = {
        let mut state = lock(&state);
        state.requests.push(recorded);
        (state.latency, state.scripted.pop_front())
    };

    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }

    if let Some(scripted) = scripted {
        let mut response = (
            scripted.status,
            [(header::CONTENT_TYPE, "application/json")],
            scripted.body,
        )
            .into_response();
        if let Some(secs) = scripted.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        return response;
    }

    if !authorized {
        return failure(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    next.run(request).await
}

fn ok(data: Value) -> Response {
    Json(json!({"success": true, "data": data})).into_response()
}

fn done(message: &str) -> Response {
    Json(json!({"success": true, "message": message})).into_response()
}

fn failure(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(json!({"success": false, "message": "Request failed", "error": error})),
    )
        .into_response()
}

fn stock_check(product: &FakeProduct, wanted: i64) -> Result<(), Response> {
    match product.stock {
        Some(available) if wanted > available => Err(failure(
            StatusCode::CONFLICT,
            &format!("Only {available} of {} left in stock", product.name),
        )),
        _ => Ok(()),
    }
}

// =============================================================================
// Cart
// =============================================================================

async fn fetch_cart(State(state): State<Shared>) -> Response {
    let state = lock(&state);
    if !state.cart_started {
        return ok(Value::Null);
    }

    let items: Vec<Value> = state
        .lines
        .iter()
        .filter_map(|line| {
            let product = state.product(&line.product_id)?;
            Some(json!({
                "id": line.id,
                "product_id": line.product_id,
                "variant_id": line.variant_id,
                "quantity": line.quantity,
                "product": product.to_json(),
            }))
        })
        .collect();

    ok(json!({"items": items, "currency": "USD"}))
}

#[derive(Debug, Deserialize)]
struct AddCartItemBody {
    product_id: String,
    quantity: i64,
    variant_id: Option<String>,
}

async fn add_cart_item(
    State(state): State<Shared>,
    Json(body): Json<AddCartItemBody>,
) -> Response {
    let mut state = lock(&state);
    if body.quantity < 1 {
        return failure(StatusCode::BAD_REQUEST, "Quantity must be at least 1");
    }
    let Some(product) = state.product(&body.product_id).cloned() else {
        return failure(StatusCode::NOT_FOUND, "Product not found");
    };

    let existing = state
        .lines
        .iter()
        .position(|l| l.product_id == body.product_id && l.variant_id == body.variant_id);
    let already = existing
        .and_then(|i| state.lines.get(i))
        .map_or(0, |l| l.quantity);
    if let Err(response) = stock_check(&product, already + body.quantity) {
        return response;
    }

    state.cart_started = true;
    if let Some(line) = existing.and_then(|i| state.lines.get_mut(i)) {
        line.quantity += body.quantity;
    } else {
        state.next_line += 1;
        let id = format!("line-{}", state.next_line);
        state.lines.push(Line {
            id,
            product_id: body.product_id,
            variant_id: body.variant_id,
            quantity: body.quantity,
        });
    }
    done("Item added to cart")
}

#[derive(Debug, Deserialize)]
struct UpdateCartItemBody {
    quantity: i64,
}

async fn update_cart_item(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCartItemBody>,
) -> Response {
    let mut state = lock(&state);
    if body.quantity < 1 {
        return failure(StatusCode::BAD_REQUEST, "Quantity must be at least 1");
    }
    let Some(product_id) = state
        .lines
        .iter()
        .find(|l| l.id == id)
        .map(|l| l.product_id.clone())
    else {
        return failure(StatusCode::NOT_FOUND, "Cart item not found");
    };
    if let Some(product) = state.product(&product_id)
        && let Err(response) = stock_check(product, body.quantity)
    {
        return response;
    }

    if let Some(line) = state.lines.iter_mut().find(|l| l.id == id) {
        line.quantity = body.quantity;
    }
    done("Cart updated")
}

async fn remove_cart_item(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = lock(&state);
    let before = state.lines.len();
    state.lines.retain(|l| l.id != id);
    if state.lines.len() == before {
        return failure(StatusCode::NOT_FOUND, "Cart item not found");
    }
    done("Item removed")
}

async fn clear_cart(State(state): State<Shared>) -> Response {
    lock(&state).lines.clear();
    // Some deployments answer deletes with an empty body
    StatusCode::NO_CONTENT.into_response()
}

// =============================================================================
// Wishlist
// =============================================================================

async fn fetch_wishlist(State(state): State<Shared>) -> Response {
    let state = lock(&state);
    let items: Vec<Value> = state
        .wishlist
        .iter()
        .filter_map(|id| {
            let product = state.product(id)?;
            Some(json!({
                "product_id": id,
                "created_at": "2024-05-01T12:00:00Z",
                "product": product.to_json(),
            }))
        })
        .collect();
    ok(Value::Array(items))
}

#[derive(Debug, Deserialize)]
struct AddWishlistItemBody {
    product_id: String,
}

async fn add_wishlist_item(
    State(state): State<Shared>,
    Json(body): Json<AddWishlistItemBody>,
) -> Response {
    let mut state = lock(&state);
    if state.product(&body.product_id).is_none() {
        return failure(StatusCode::NOT_FOUND, "Product not found");
    }
    if !state.wishlist.contains(&body.product_id) {
        state.wishlist.push(body.product_id);
    }
    done("Added to wishlist")
}

async fn remove_wishlist_item(
    State(state): State<Shared>,
    Path(product_id): Path<String>,
) -> Response {
    lock(&state).wishlist.retain(|id| *id != product_id);
    done("Removed from wishlist")
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
struct ProductsQuery {
    search: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
}

async fn fetch_products(
    State(state): State<Shared>,
    Query(query): Query<ProductsQuery>,
) -> Response {
    let state = lock(&state);
    let search = query.search.map(|s| s.to_lowercase());
    let products: Vec<Value> = state
        .products
        .iter()
        .filter(|p| {
            query
                .category
                .as_ref()
                .is_none_or(|c| p.category.as_ref() == Some(c))
        })
        .filter(|p| {
            search
                .as_ref()
                .is_none_or(|s| p.name.to_lowercase().contains(s))
        })
        .take(query.limit.unwrap_or(usize::MAX))
        .map(FakeProduct::to_json)
        .collect();
    ok(Value::Array(products))
}

async fn fetch_product(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    lock(&state).product(&id).map_or_else(
        || failure(StatusCode::NOT_FOUND, "Product not found"),
        |p| ok(p.to_json()),
    )
}
