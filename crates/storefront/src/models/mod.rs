//! Per-visitor state kept in the session.
//!
//! The storefront has no database; everything it remembers about a visitor
//! between requests lives in the `tower-sessions` session.

pub mod flash;
pub mod session;

pub use flash::{Flash, FlashLevel};
pub use session::keys as session_keys;
