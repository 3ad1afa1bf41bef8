//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                           - Home page (hero + featured products)
//! GET  /health                     - Liveness
//! GET  /health/ready               - Readiness (commerce API reachable)
//!
//! # Products
//! GET  /products                   - Listing (page, q, category, sort)
//! GET  /products/{slug}            - Product detail
//!
//! # Cart (HTMX fragments or redirects)
//! GET  /cart                       - Cart page
//! POST /cart/add                   - Add (count badge fragment, triggers cart-updated)
//! POST /cart/update                - Update quantity (cart_items fragment)
//! POST /cart/remove                - Remove line (cart_items fragment)
//! GET  /cart/count                 - Cart count badge (fragment)
//! POST /cart/coupon                - Apply coupon (rate limited)
//! POST /cart/coupon/remove         - Remove coupon (rate limited)
//!
//! # Checkout
//! GET  /checkout                   - Redirect to first incomplete step
//! GET  /checkout/{step}            - Render step
//! POST /checkout/{step}            - Validate and advance (review: 307 to place-order)
//! POST /checkout/place-order       - Place order (rate limited)
//! GET  /orders/{id}/confirmation   - Order confirmation
//!
//! # Consent
//! POST /consent                    - Grant or deny analytics consent
//! ```

pub mod cart;
pub mod checkout;
pub mod consent;
pub mod health;
pub mod home;
pub mod layout;
pub mod orders;
pub mod products;
pub mod views;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};

use crate::middleware::{checkout_rate_limiter, coupon_rate_limiter};
use crate::models::Flash;
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let coupons = Router::new()
        .route("/coupon", post(cart::apply_coupon))
        .route("/coupon/remove", post(cart::remove_coupon))
        .layer(coupon_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .merge(coupons)
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    let place_order = Router::new()
        .route("/place-order", post(checkout::place_order))
        .layer(checkout_rate_limiter());

    Router::new()
        .route("/", get(checkout::index))
        .route(
            "/{step}",
            get(checkout::show_step).post(checkout::submit_step),
        )
        .merge(place_order)
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/orders/{id}/confirmation", get(orders::confirmation))
        .route("/consent", post(consent::update))
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Whether the request was issued by htmx.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true")
}

/// A local path to send the shopper back to, or `default`.
///
/// Only same-site absolute paths are accepted, so form input cannot turn
/// the redirect into an open redirect.
#[must_use]
pub fn safe_return_path(candidate: Option<&str>, default: &str) -> String {
    candidate
        .map(str::trim)
        .filter(|p| p.starts_with('/') && !p.starts_with("//") && !p.contains('\\'))
        .unwrap_or(default)
        .to_string()
}

/// A single toast, appended to the page's toast region.
#[derive(Template, WebTemplate)]
#[template(path = "partials/toast.html")]
pub struct ToastTemplate<'a> {
    pub flash: &'a Flash,
}

/// Respond to an htmx request with a toast instead of the usual fragment.
pub fn toast(flash: &Flash) -> Response {
    (
        AppendHeaders([("HX-Retarget", "#toasts"), ("HX-Reswap", "beforeend")]),
        ToastTemplate { flash },
    )
        .into_response()
}
