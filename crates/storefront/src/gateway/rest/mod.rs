//! Gateway REST API client.
//!
//! JSON over HTTP with `reqwest`. Every response is wrapped in an
//! [`Envelope`](wire::Envelope); the payload is validated by
//! [`conversions`] before it reaches a synchronizer.

mod conversions;
mod wire;

use std::sync::Arc;
use std::time::Duration;

use bazaar_core::{
    Cart, CartItemId, Product, ProductId, ProductQuery, Quantity, VariantId, Wishlist,
};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, instrument};
use url::Url;

use super::{CartGateway, CatalogGateway, GatewayError, WishlistGateway};
use crate::config::{GatewayConfig, expose};

use conversions::{convert_cart, convert_product, convert_wishlist};
use wire::{
    AddCartItemRequest, AddWishlistItemRequest, Envelope, UpdateCartItemRequest, WireCart,
    WireProduct, WireWishlistItem,
};

const API_KEY_HEADER: HeaderName = HeaderName::from_static("apikey");
const SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

/// Longest slice of a response body copied into logs and errors.
const BODY_PREVIEW_CHARS: usize = 300;

/// Client for the Gateway REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RestGateway {
    inner: Arc<RestGatewayInner>,
}

struct RestGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl RestGateway {
    /// Create a new Gateway client.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();

        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(API_KEY_HEADER, sensitive_header(expose(&config.api_key))?);

        if let Some(token) = &config.access_token {
            headers.insert(
                AUTHORIZATION,
                sensitive_header(&format!("Bearer {}", expose(token)))?,
            );
        }

        headers.insert(
            SESSION_HEADER,
            HeaderValue::from_str(&config.session_id)
                .map_err(|e| GatewayError::Malformed(format!("Invalid session id: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            inner: Arc::new(RestGatewayInner {
                client,
                base_url: config.base_url.clone(),
                timeout: config.request_timeout,
            }),
        })
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Malformed("Gateway URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport_error(&self, err: &reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.inner.timeout)
        } else if err.is_decode() {
            GatewayError::Parse(err.to_string())
        } else {
            GatewayError::Unreachable(err.to_string())
        }
    }

    /// Send a request and unwrap the response envelope.
    ///
    /// Returns the envelope's `data`, which may legitimately be absent.
    async fn execute<T, B>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Option<T>, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.inner.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await.map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<IgnoredAny>>(&response_text)
                .ok()
                .and_then(|e| e.failure_message().map(str::to_string))
                .unwrap_or_else(|| preview(&response_text));

            tracing::error!(
                status = %status,
                body = %preview(&response_text),
                "Gateway returned non-success status"
            );

            if status == StatusCode::NOT_FOUND {
                return Err(GatewayError::NotFound(message));
            }
            return Err(GatewayError::Rejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        if response_text.trim().is_empty() {
            return Ok(None);
        }

        let envelope: Envelope<T> = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %preview(&response_text),
                "Failed to parse Gateway response"
            );
            GatewayError::from(e)
        })?;

        if envelope.success == Some(false) {
            let message = envelope
                .failure_message()
                .unwrap_or("Request failed")
                .to_string();
            debug!(status = %status, message = %message, "Gateway reported failure");
            return Err(GatewayError::Rejected {
                status: Some(status.as_u16()),
                message,
            });
        }

        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, GatewayError> {
        self.execute::<T, ()>(Method::GET, url, None).await
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<(), GatewayError> {
        self.execute::<IgnoredAny, B>(method, url, body)
            .await
            .map(|_| ())
    }
}

impl CartGateway for RestGateway {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Cart, GatewayError> {
        let data = self.get::<WireCart>(self.endpoint(&["cart"])?).await?;
        convert_cart(data)
    }

    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity))]
    async fn add_cart_item(
        &self,
        product_id: &ProductId,
        quantity: Quantity,
        variant_id: Option<&VariantId>,
    ) -> Result<(), GatewayError> {
        let body = AddCartItemRequest {
            product_id: product_id.as_str(),
            quantity: quantity.get(),
            variant_id: variant_id.map(VariantId::as_str),
        };
        self.write(Method::POST, self.endpoint(&["cart", "items"])?, Some(&body))
            .await
    }

    #[instrument(skip(self), fields(item_id = %item_id, quantity = %quantity))]
    async fn update_cart_item(
        &self,
        item_id: &CartItemId,
        quantity: Quantity,
    ) -> Result<(), GatewayError> {
        let body = UpdateCartItemRequest {
            quantity: quantity.get(),
        };
        let url = self.endpoint(&["cart", "items", item_id.as_str()])?;
        self.write(Method::PATCH, url, Some(&body)).await
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn remove_cart_item(&self, item_id: &CartItemId) -> Result<(), GatewayError> {
        let url = self.endpoint(&["cart", "items", item_id.as_str()])?;
        self.write::<()>(Method::DELETE, url, None).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), GatewayError> {
        let url = self.endpoint(&["cart", "items"])?;
        self.write::<()>(Method::DELETE, url, None).await
    }
}

impl WishlistGateway for RestGateway {
    #[instrument(skip(self))]
    async fn fetch_wishlist(&self) -> Result<Wishlist, GatewayError> {
        let data = self
            .get::<Vec<WireWishlistItem>>(self.endpoint(&["wishlist"])?)
            .await?;
        convert_wishlist(data)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_wishlist_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        let body = AddWishlistItemRequest {
            product_id: product_id.as_str(),
        };
        self.write(
            Method::POST,
            self.endpoint(&["wishlist", "items"])?,
            Some(&body),
        )
        .await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_wishlist_item(&self, product_id: &ProductId) -> Result<(), GatewayError> {
        let url = self.endpoint(&["wishlist", "items", product_id.as_str()])?;
        self.write::<()>(Method::DELETE, url, None).await
    }
}

impl CatalogGateway for RestGateway {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn fetch_product(&self, product_id: &ProductId) -> Result<Product, GatewayError> {
        let url = self.endpoint(&["products", product_id.as_str()])?;
        let data = self
            .get::<WireProduct>(url)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("Product not found: {product_id}")))?;
        convert_product(data)
    }

    #[instrument(skip(self))]
    async fn fetch_products(&self, query: &ProductQuery) -> Result<Vec<Product>, GatewayError> {
        let mut url = self.endpoint(&["products"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(search) = &query.search {
                pairs.append_pair("search", search);
            }
            if let Some(category) = &query.category {
                pairs.append_pair("category", category);
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        self.get::<Vec<WireProduct>>(url)
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(convert_product)
            .collect()
    }
}

fn sensitive_header(value: &str) -> Result<HeaderValue, GatewayError> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|e| GatewayError::Malformed(format!("Invalid credential format: {e}")))?;
    header.set_sensitive(true);
    Ok(header)
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn gateway(base: &str) -> RestGateway {
        let config = GatewayConfig::new(base, SecretString::from("k3y-Abc")).unwrap();
        RestGateway::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let gateway = gateway("https://api.bazaar.test/rest/v1");
        let url = gateway.endpoint(&["cart", "items", "line 1/2"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.bazaar.test/rest/v1/cart/items/line%201%2F2"
        );
    }

    #[test]
    fn test_endpoint_at_root() {
        let gateway = gateway("http://127.0.0.1:8080");
        let url = gateway.endpoint(&["wishlist"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/wishlist");
    }

    #[test]
    fn test_invalid_credential_rejected() {
        let config =
            GatewayConfig::new("http://127.0.0.1:8080", SecretString::from("bad\nkey")).unwrap();
        assert!(matches!(
            RestGateway::new(&config),
            Err(GatewayError::Malformed(_))
        ));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let gateway = gateway("http://127.0.0.1:8080");
        let debug_output = format!("{gateway:?}");
        assert!(debug_output.contains("127.0.0.1"));
        assert!(!debug_output.contains("k3y-Abc"));
    }

    #[test]
    fn test_preview_truncates() {
        let body = "x".repeat(1000);
        assert_eq!(preview(&body).len(), BODY_PREVIEW_CHARS);
    }
}
