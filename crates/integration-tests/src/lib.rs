//! Integration tests for the Larkspur storefront.
//!
//! The storefront router runs in-process against a `wiremock` stand-in for
//! the commerce API, so no network services are needed:
//!
//! ```bash
//! cargo test -p larkspur-integration-tests
//! ```
//!
//! [`TestContext`] carries the session cookie between requests the way a
//! browser would, so multi-step flows (add to cart, then check out) keep
//! their cart token.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use larkspur_storefront::config::{
    AnalyticsConfig, CacheConfig, CommerceApiConfig, StorefrontConfig,
};
use larkspur_storefront::state::AppState;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client address sent with every request; rate-limited routes key on it.
pub const CLIENT_IP: &str = "203.0.113.7";

/// A storefront wired to a mock commerce API.
pub struct TestContext {
    pub server: MockServer,
    app: Router,
    cookie: Option<String>,
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// The `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// A response header as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestContext {
    /// Start a mock API with site and marketing config mounted.
    pub async fn new() -> Self {
        Self::with_marketing(json!({"consent_required": true})).await
    }

    /// Start a mock API serving `marketing` as the marketing config.
    pub async fn with_marketing(marketing: Value) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/config/site"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "store_name": "Larkspur Test Shop",
                    "currency": "USD",
                    "free_shipping_threshold": "75.00"
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/config/marketing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": marketing})))
            .mount(&server)
            .await;

        let config = StorefrontConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("t7#Qv2!mX9$kL4@pR8&wZ1^nB6*cF3%h".to_string()),
            commerce: CommerceApiConfig::for_url(&format!("{}/api", server.uri())).unwrap(),
            cache: CacheConfig::default(),
            analytics: AnalyticsConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let state = AppState::new(config).unwrap();

        Self {
            server,
            app: larkspur_storefront::app(state),
            cookie: None,
        }
    }

    /// Mount a JSON response for `GET /api{api_path}`.
    pub async fn mock_get(&self, api_path: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api{api_path}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount a JSON response for `POST /api{api_path}`.
    pub async fn mock_post(&self, api_path: &str, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(format!("/api{api_path}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Paths of every request the mock API has received so far.
    pub async fn api_paths(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    /// Issue a GET.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// Issue a form POST.
    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = form_body(fields);
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Issue a form POST the way htmx does.
    pub async fn post_htmx(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = form_body(fields);
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("hx-request", "true")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", CLIENT_IP);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();

        if let Some(cookie) = headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        {
            self.cookie = Some(cookie.to_string());
        }

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

fn form_body(fields: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// A one-line cart as the commerce API returns it.
#[must_use]
pub fn cart_json() -> Value {
    json!({
        "cart": {
            "items": [{
                "id": 5,
                "product_id": 9,
                "name": "Enamel Mug",
                "slug": "enamel-mug",
                "quantity": 2,
                "unit_price": "14.50"
            }],
            "totals": {"subtotal": "29.00", "shipping": "0", "tax": "2.32", "total": "31.32"}
        }
    })
}

/// Shipping methods offered for the test cart.
#[must_use]
pub fn shipping_methods_json() -> Value {
    json!({"data": [{"id": "std", "name": "Standard", "price": "5.00"}]})
}

/// Payment gateways: one offline, one that redirects to a hosted page.
#[must_use]
pub fn payment_gateways_json() -> Value {
    json!({"data": [
        {"id": "cod", "name": "Cash on delivery", "kind": "offline"},
        {"id": "hosted", "name": "Hosted card page", "kind": "redirect"}
    ]})
}

/// An order as the commerce API returns it after placement.
#[must_use]
pub fn order_json(payment_url: Option<&str>) -> Value {
    json!({
        "data": {
            "id": 1042,
            "order_number": "LK-1042",
            "items": [{
                "id": 5,
                "product_id": 9,
                "name": "Enamel Mug",
                "quantity": 2,
                "unit_price": "14.50"
            }],
            "totals": {"subtotal": "29.00", "shipping": "5.00", "tax": "2.32", "total": "36.32"},
            "payment_url": payment_url
        }
    })
}

/// A complete shipping address as checkout form fields.
#[must_use]
pub fn shipping_address_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("shipping_first_name", "Ada"),
        ("shipping_last_name", "Lovelace"),
        ("shipping_line1", "12 Marsh Lane"),
        ("shipping_city", "Portland"),
        ("shipping_region", "OR"),
        ("shipping_postal_code", "97201"),
        ("shipping_country_code", "us"),
    ]
}
