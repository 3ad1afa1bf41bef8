//! Commerce API client implementation.
//!
//! Thin `reqwest` wrapper: builds endpoint URLs, attaches auth and cart
//! headers, maps HTTP failures to [`CommerceError`], and hands response
//! bodies to [`normalize`](super::normalize) before decoding.
//! Caches catalog reads using `moka`.

use std::sync::Arc;

use larkspur_core::{CartItemId, OrderId, ProductId, VariantId};
use moka::future::Cache;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use crate::commerce::CommerceError;
use crate::commerce::cache::{CacheKey, CacheValue};
use crate::commerce::normalize::{self, PageMeta, Record};
use crate::commerce::types::{
    Cart, Category, Order, OrderRequest, Page, PaymentGateway, Product, ProductQuery,
    ShippingMethod,
};
use crate::config::{CacheConfig, CommerceApiConfig};

/// Header carrying the visitor's cart token.
pub const CART_TOKEN_HEADER: &str = "x-cart-token";

/// How much of an error body is kept in logs.
const LOGGED_BODY_CHARS: usize = 500;

// =============================================================================
// CommerceClient
// =============================================================================

/// Client for the commerce REST API.
///
/// Cheap to clone; all clones share one connection pool and cache.
#[derive(Clone)]
pub struct CommerceClient {
    inner: Arc<CommerceClientInner>,
}

struct CommerceClientInner {
    client: reqwest::Client,
    base_url: Url,
    asset_base_url: Url,
    api_token: Option<SecretString>,
    cache: Cache<CacheKey, CacheValue>,
}

impl CommerceClient {
    /// Create a new commerce API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &CommerceApiConfig, cache: &CacheConfig) -> Result<Self, CommerceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .user_agent(concat!("larkspur-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(cache.product_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(CommerceClientInner {
                client,
                base_url: config.base_url.clone(),
                asset_base_url: config.asset_base_url.clone(),
                api_token: config.api_token.clone(),
                cache,
            }),
        })
    }

    /// Base URL used to resolve relative image paths.
    #[must_use]
    pub fn asset_base_url(&self) -> &Url {
        &self.inner.asset_base_url
    }

    /// Send a request and return the parsed JSON body.
    ///
    /// Empty bodies (e.g. `204 No Content`) come back as `Value::Null`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        cart_token: Option<&str>,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, CommerceError> {
        let mut url = self.inner.base_url.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        let mut request = self.inner.client.request(method.clone(), url);
        if let Some(token) = &self.inner.api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }
        if let Some(cart_token) = cart_token {
            request = request.header(CART_TOKEN_HEADER, cart_token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(CommerceError::RateLimited(retry_after));
        }

        // Read as text first for better error diagnostics
        let text = response.text().await?;
        let parsed: Option<Value> = if text.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str(&text).ok()
        };

        if !status.is_success() {
            return Err(error_from_response(status, path, &text, parsed.as_ref()));
        }

        parsed.ok_or_else(|| {
            tracing::error!(
                %method,
                path,
                body = %truncate(&text),
                "Commerce API returned a non-JSON body"
            );
            CommerceError::Parse(format!("{method} {path}: body is not JSON"))
        })
    }

    async fn get(&self, path: &str, cart_token: Option<&str>) -> Result<Value, CommerceError> {
        self.send(Method::GET, path, cart_token, &[], None).await
    }

    /// Decode a single record after normalization.
    fn record<T: DeserializeOwned>(
        value: Value,
        keys: &[&str],
        what: &str,
        prepare: impl FnOnce(&mut Value),
    ) -> Result<T, CommerceError> {
        match normalize::unwrap_record(value, keys) {
            Record::Found(mut record) => {
                prepare(&mut record);
                decode(record, what)
            }
            Record::Missing => Err(CommerceError::NotFound(what.to_string())),
        }
    }

    /// Decode a list after normalization.
    fn list<T: DeserializeOwned>(
        value: Value,
        keys: &[&str],
        what: &str,
        mut prepare: impl FnMut(&mut Value),
    ) -> Result<(Vec<T>, PageMeta), CommerceError> {
        let (items, meta) = normalize::unwrap_list(value, keys)
            .ok_or_else(|| CommerceError::Parse(format!("{what}: expected a list")))?;
        let items = items
            .into_iter()
            .map(|mut item| {
                prepare(&mut item);
                decode(item, what)
            })
            .collect::<Result<Vec<T>, _>>()?;
        Ok((items, meta))
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// Get a paginated list of products.
    ///
    /// Non-search queries are cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response has no list.
    #[instrument(skip(self), fields(page = query.page))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, CommerceError> {
        let cache_key = CacheKey::Products(query.clone());
        if !query.is_search()
            && let Some(CacheValue::Products(page)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for product list");
            return Ok(page);
        }

        let value = self
            .send(Method::GET, "products", None, &query.to_pairs(), None)
            .await?;
        let assets = self.asset_base_url().clone();
        let (items, meta) = Self::list::<Product>(value, &["products"], "products", |p| {
            normalize::normalize_product(p, &assets);
        })?;
        let page = build_page(items, meta, query);

        if !query.is_search() {
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Get featured products for the home page.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn featured_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError> {
        let query = ProductQuery {
            page: 1,
            per_page: limit,
            featured: true,
            ..ProductQuery::default()
        };
        Ok(self.list_products(&query).await?.items)
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown slugs, or an error if the request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_product(&self, slug: &str) -> Result<Product, CommerceError> {
        let cache_key = CacheKey::Product(slug.to_string());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let path = format!("products/{}", encode_segment(slug));
        let value = self.get(&path, None).await?;
        let assets = self.asset_base_url().clone();
        let product: Product = Self::record(value, &["product"], &path, |p| {
            normalize::normalize_product(p, &assets);
        })?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// Get all product categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, CommerceError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            return Ok(categories);
        }

        let value = self.get("categories", None).await?;
        let (categories, _) =
            Self::list::<Category>(value, &["categories"], "categories", |_| {})?;

        self.inner
            .cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Decode a cart from a mutation response.
    ///
    /// Some cart endpoints answer with only a status message; the cart is then
    /// fetched again.
    async fn cart_from(&self, value: Value, cart_token: &str) -> Result<Cart, CommerceError> {
        let carries_cart = match normalize::unwrap_record(value.clone(), &["cart"]) {
            Record::Found(Value::Object(obj)) => {
                ["items", "lines", "line_items"].iter().any(|k| obj.contains_key(*k))
            }
            _ => false,
        };
        if !carries_cart {
            debug!("Cart mutation returned no cart; refetching");
            return self.get_cart(cart_token).await;
        }

        let assets = self.asset_base_url().clone();
        Self::record(value, &["cart"], "cart", |c| normalize::normalize_cart(c, &assets))
    }

    /// Get the visitor's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, cart_token))]
    pub async fn get_cart(&self, cart_token: &str) -> Result<Cart, CommerceError> {
        let value = self.get("cart", Some(cart_token)).await?;
        let assets = self.asset_base_url().clone();
        match normalize::unwrap_record(value, &["cart"]) {
            // A visitor who never added anything has no cart yet.
            Record::Missing => Ok(Cart::default()),
            Record::Found(mut cart) => {
                normalize::normalize_cart(&mut cart, &assets);
                decode(cart, "cart")
            }
        }
    }

    /// Add a product (or one of its variants) to the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the line (e.g. out of stock).
    #[instrument(skip(self, cart_token), fields(product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        cart_token: &str,
        product_id: &ProductId,
        variant_id: Option<&VariantId>,
        quantity: u32,
    ) -> Result<Cart, CommerceError> {
        let body = json!({
            "product_id": product_id,
            "variant_id": variant_id,
            "quantity": quantity.max(1),
        });
        let value = self
            .send(Method::POST, "cart/add", Some(cart_token), &[], Some(body))
            .await?;
        self.cart_from(value, cart_token).await
    }

    /// Change a line's quantity. A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, cart_token), fields(item_id = %item_id))]
    pub async fn update_cart_item(
        &self,
        cart_token: &str,
        item_id: &CartItemId,
        quantity: u32,
    ) -> Result<Cart, CommerceError> {
        if quantity == 0 {
            return self.remove_cart_item(cart_token, item_id).await;
        }
        let path = format!("cart/items/{}", encode_segment(item_id.as_str()));
        let value = self
            .send(
                Method::PUT,
                &path,
                Some(cart_token),
                &[],
                Some(json!({ "quantity": quantity })),
            )
            .await?;
        self.cart_from(value, cart_token).await
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, cart_token), fields(item_id = %item_id))]
    pub async fn remove_cart_item(
        &self,
        cart_token: &str,
        item_id: &CartItemId,
    ) -> Result<Cart, CommerceError> {
        let path = format!("cart/items/{}", encode_segment(item_id.as_str()));
        let value = self
            .send(Method::DELETE, &path, Some(cart_token), &[], None)
            .await?;
        self.cart_from(value, cart_token).await
    }

    /// Apply a coupon code. Validation is entirely up to the backend.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection (`Api`/`Validation`) for bad codes.
    #[instrument(skip(self, cart_token))]
    pub async fn apply_coupon(&self, cart_token: &str, code: &str) -> Result<Cart, CommerceError> {
        let value = self
            .send(
                Method::POST,
                "cart/coupon",
                Some(cart_token),
                &[],
                Some(json!({ "code": code.trim() })),
            )
            .await?;
        self.cart_from(value, cart_token).await
    }

    /// Remove the applied coupon.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, cart_token))]
    pub async fn remove_coupon(&self, cart_token: &str) -> Result<Cart, CommerceError> {
        let value = self
            .send(Method::DELETE, "cart/coupon", Some(cart_token), &[], None)
            .await?;
        self.cart_from(value, cart_token).await
    }

    // =========================================================================
    // Checkout Methods
    // =========================================================================

    /// Shipping options available for the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, cart_token))]
    pub async fn shipping_methods(
        &self,
        cart_token: &str,
    ) -> Result<Vec<ShippingMethod>, CommerceError> {
        let value = self.get("shipping/methods", Some(cart_token)).await?;
        let (methods, _) = Self::list::<ShippingMethod>(
            value,
            &["methods", "shipping_methods"],
            "shipping methods",
            |_| {},
        )?;
        Ok(methods)
    }

    /// Enabled payment gateways.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn payment_gateways(&self) -> Result<Vec<PaymentGateway>, CommerceError> {
        let value = self.get("payment/gateways", None).await?;
        let (gateways, _) = Self::list::<PaymentGateway>(
            value,
            &["gateways", "payment_gateways"],
            "payment gateways",
            |g| {
                if let Value::Object(obj) = g
                    && !obj.contains_key("name")
                    && let Some(title) = obj.remove("title")
                {
                    obj.insert("name".into(), title);
                }
            },
        )?;
        Ok(gateways.into_iter().filter(|g| g.enabled).collect())
    }

    /// Place an order for the cart.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection (payment declined, stock changed, ...).
    #[instrument(skip(self, request), fields(gateway = %request.payment_gateway_id))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<Order, CommerceError> {
        let body = serde_json::to_value(request)
            .map_err(|e| CommerceError::Parse(format!("order request: {e}")))?;
        let value = self
            .send(Method::POST, "orders", Some(&request.cart_token), &[], Some(body))
            .await?;
        let assets = self.asset_base_url().clone();
        Self::record(value, &["order"], "order", |o| {
            normalize::normalize_cart(o, &assets);
        })
    }

    /// Fetch an order placed from this cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist or belongs to another cart.
    #[instrument(skip(self, cart_token), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        cart_token: &str,
        order_id: &OrderId,
    ) -> Result<Order, CommerceError> {
        let path = format!("orders/{}", encode_segment(order_id.as_str()));
        let value = self.get(&path, Some(cart_token)).await?;
        let assets = self.asset_base_url().clone();
        Self::record(value, &["order"], &path, |o| {
            normalize::normalize_cart(o, &assets);
        })
    }

    // =========================================================================
    // Configuration Methods
    // =========================================================================

    /// Raw site configuration object.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn site_config(&self) -> Result<Value, CommerceError> {
        self.config_object("config/site", &["config", "site"]).await
    }

    /// Raw marketing configuration object.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn marketing_config(&self) -> Result<Value, CommerceError> {
        self.config_object("config/marketing", &["config", "marketing"])
            .await
    }

    async fn config_object(&self, path: &str, keys: &[&str]) -> Result<Value, CommerceError> {
        match normalize::unwrap_record(self.get(path, None).await?, keys) {
            Record::Found(value @ Value::Object(_)) => Ok(value),
            Record::Found(_) => Err(CommerceError::Parse(format!("{path}: expected an object"))),
            Record::Missing => Err(CommerceError::NotFound(path.to_string())),
        }
    }

    /// Readiness probe: a cheap authenticated read against the API.
    ///
    /// # Errors
    ///
    /// Returns an error if the API is unreachable or answers with a failure.
    pub async fn ping(&self) -> Result<(), CommerceError> {
        self.get("config/site", None).await.map(|_| ())
    }

    /// Drop every cached catalog entry.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn decode<T: DeserializeOwned>(mut value: Value, what: &str) -> Result<T, CommerceError> {
    normalize::strip_nulls(&mut value);
    serde_json::from_value(value).map_err(|e| {
        tracing::error!(error = %e, what, "Failed to decode commerce API response");
        CommerceError::Parse(format!("{what}: {e}"))
    })
}

/// Map a non-success response to an error, passing the backend message through.
fn error_from_response(
    status: StatusCode,
    path: &str,
    text: &str,
    body: Option<&Value>,
) -> CommerceError {
    let message = body
        .and_then(normalize::error_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    if status.is_server_error() {
        tracing::error!(
            status = %status,
            path,
            body = %truncate(text),
            "Commerce API returned a server error"
        );
    } else {
        tracing::warn!(status = %status, path, message = %message, "Commerce API rejected request");
    }

    match status {
        StatusCode::NOT_FOUND => CommerceError::NotFound(path.to_string()),
        StatusCode::UNPROCESSABLE_ENTITY => CommerceError::Validation {
            message,
            fields: body.map(normalize::field_errors).unwrap_or_default(),
        },
        _ => CommerceError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Assemble a page, filling metadata the backend did not send.
fn build_page<T>(items: Vec<T>, meta: PageMeta, query: &ProductQuery) -> Page<T> {
    let count = u64::try_from(items.len()).unwrap_or(u64::MAX);
    let page = meta.page.unwrap_or_else(|| query.page.max(1));
    let per_page = meta.per_page.unwrap_or_else(|| query.effective_per_page());
    let total = meta.total.unwrap_or(count);
    let last_page = meta.last_page.unwrap_or_else(|| {
        if meta.total.is_some() && per_page > 0 {
            u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX)
        } else {
            page
        }
    });

    Page {
        items,
        page,
        per_page,
        total,
        last_page: last_page.max(1),
    }
}

/// Percent-encode one URL path segment.
pub(crate) fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn truncate(text: &str) -> String {
    text.chars().take(LOGGED_BODY_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, CommerceApiConfig};
    use larkspur_core::CurrencyCode;
    use rust_decimal::Decimal;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CommerceClient {
        let config = CommerceApiConfig::for_url(&format!("{}/api", server.uri())).unwrap();
        CommerceClient::new(&config, &CacheConfig::default()).unwrap()
    }

    #[test]
    fn test_build_page_without_meta_is_single_page() {
        let page = build_page(vec![1, 2, 3], PageMeta::default(), &ProductQuery::default());
        assert_eq!(page.page, 1);
        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 1);
        assert!(!page.has_next());
    }

    #[test]
    fn test_build_page_derives_last_page_from_total() {
        let meta = PageMeta {
            page: Some(2),
            per_page: Some(10),
            total: Some(35),
            last_page: None,
        };
        let page = build_page(vec![0; 10], meta, &ProductQuery::default());
        assert_eq!(page.last_page, 4);
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_get_product_normalizes_envelope_and_images() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/oak-board"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "product": {
                        "id": 12,
                        "slug": "oak-board",
                        "title": "Oak Board",
                        "price": "48.00",
                        "currency": "usd",
                        "image_url": "/media/oak.jpg"
                    }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let product = client.get_product("oak-board").await.unwrap();
        assert_eq!(product.name, "Oak Board");
        assert_eq!(product.currency, Some(CurrencyCode::USD));
        assert_eq!(
            product.image.unwrap().url,
            format!("{}/media/oak.jpg", server.uri())
        );

        // Second read is served from cache (mock expects exactly one call).
        let again = client.get_product("oak-board").await.unwrap();
        assert_eq!(again.slug, "oak-board");
    }

    #[tokio::test]
    async fn test_explicit_nulls_decode_as_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/linen-towel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": 4,
                    "slug": "linen-towel",
                    "name": "Linen Towel",
                    "description": null,
                    "price": "18.00",
                    "variants": null,
                    "image": null
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cart": {
                    "items": [{"id": 1, "product_id": 4, "name": "Linen Towel",
                               "quantity": 1, "unit_price": "18.00", "image": null}],
                    "subtotal": "18.00",
                    "discount": null,
                    "total": "18.00",
                    "coupon": null
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let product = client.get_product("linen-towel").await.unwrap();
        assert_eq!(product.description, "");
        assert!(product.variants.is_empty());
        assert!(product.image.is_none());

        let cart = client.get_cart("tok").await.unwrap();
        assert_eq!(cart.discount, Decimal::ZERO);
        assert_eq!(cart.total, Decimal::new(1800, 2));
        assert!(cart.coupon.is_none());
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/ghost"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "No query results"})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.get_product("ghost").await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_products_forwards_query_and_reads_meta() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "2"))
            .and(query_param("category", "kitchen"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": 1, "slug": "a", "name": "A", "price": 5},
                    {"id": 2, "slug": "b", "name": "B", "price": 6}
                ],
                "meta": {"current_page": 2, "per_page": 2, "total": 7}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client
            .list_products(&ProductQuery {
                page: 2,
                per_page: 2,
                category: Some("kitchen".into()),
                ..ProductQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.last_page, 4);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_cart_calls_send_cart_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart"))
            .and(header(CART_TOKEN_HEADER, "tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cart": {
                    "items": [{
                        "id": 5, "quantity": 2, "price": "3.25",
                        "product": {"id": 9, "name": "Spoon", "slug": "spoon", "thumbnail": "s.jpg"}
                    }],
                    "totals": {"subtotal": "6.50", "total": "6.50"}
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cart = client.get_cart("tok-1").await.unwrap();
        assert_eq!(cart.item_count(), 2);
        let item = cart.items.first().unwrap();
        assert_eq!(item.name, "Spoon");
        assert!(item.image.as_ref().unwrap().url.ends_with("/s.jpg"));
    }

    #[tokio::test]
    async fn test_get_cart_null_data_is_empty_cart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.get_cart("fresh").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_to_cart_refetches_when_response_has_no_cart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cart/add"))
            .and(body_json(json!({"product_id": "9", "variant_id": null, "quantity": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Added"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": 1, "product_id": 9, "name": "Spoon", "quantity": 1, "unit_price": 3}],
                "total": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cart = client
            .add_to_cart("tok", &ProductId::new("9"), None, 0)
            .await
            .unwrap();
        assert_eq!(cart.item_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_coupon_passes_backend_message_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/cart/coupon"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({
                    "message": "The coupon WELCOME is no longer valid.",
                    "errors": {"code": ["The coupon WELCOME is no longer valid."]}
                })),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.apply_coupon("tok", " WELCOME ").await.unwrap_err();
        assert_eq!(err.user_message(), "The coupon WELCOME is no longer valid.");
        match err {
            CommerceError::Validation { fields, .. } => {
                assert_eq!(fields.first().unwrap().0, "code");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_payment_gateways_filters_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/payment/gateways"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "gateways": [
                    {"id": "card", "title": "Credit card", "kind": "card"},
                    {"id": "bank", "name": "Bank transfer", "kind": "offline", "enabled": false}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let gateways = client.payment_gateways().await.unwrap();
        assert_eq!(gateways.len(), 1);
        assert_eq!(gateways.first().unwrap().name, "Credit card");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/categories"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.list_categories().await.unwrap_err();
        assert!(matches!(err, CommerceError::RateLimited(12)));
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/config/site"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.site_config().await.unwrap_err();
        assert!(matches!(err, CommerceError::Api { status: 503, .. }));
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
    }
}
