//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span, see [`make_request_span`])
//! 3. Request ID (recorded on the span and the Sentry scope)
//! 4. Security headers (generates the CSP nonce, sets CSP and friends)
//! 5. Session layer (tower-sessions, moka-backed store, signed cookie)
//! 6. Rate limiting on coupon and order routes (governor)

pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod session_store;

pub use csp::CspNonce;
pub use rate_limit::{checkout_rate_limiter, coupon_rate_limiter};
pub use request_id::{make_request_span, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use session_store::MokaSessionStore;
