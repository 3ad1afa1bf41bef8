//! Larkspur Storefront library.
//!
//! A server-rendered storefront over a remote commerce REST API. The API
//! owns products, carts, coupons and orders; this crate renders pages,
//! keeps per-visitor session state and reports consent-gated analytics.
//!
//! The router is built by [`app`] so integration tests can drive it without
//! binding a socket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod checkout;
pub mod commerce;
pub mod config;
pub mod error;
pub mod filters;
pub mod hero;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod site_config;
pub mod state;

use std::path::Path;

use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the storefront router with its full middleware stack.
///
/// See [`middleware`] for the layer order.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());
    let static_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("static");

    Router::new()
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(session_layer)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(middleware::make_request_span))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
