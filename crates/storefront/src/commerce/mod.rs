//! Commerce API client.
//!
//! # Architecture
//!
//! - The remote commerce API is the source of truth for products, carts,
//!   coupons and orders; the storefront never computes prices or validates
//!   coupons itself
//! - Responses are normalized (envelopes, image fields) in [`normalize`]
//!   before being decoded into [`types`]
//! - Catalog reads are cached in memory via `moka`; cart and order calls
//!   never are
//!
//! # Example
//!
//! ```rust,ignore
//! use larkspur_storefront::commerce::CommerceClient;
//!
//! let client = CommerceClient::new(&config.commerce, &config.cache)?;
//!
//! let product = client.get_product("linen-apron").await?;
//! let cart = client
//!     .add_to_cart(&cart_token, &product.id, None, 1)
//!     .await?;
//! ```

mod cache;
mod client;
pub mod normalize;
pub mod types;

pub use client::CommerceClient;
pub(crate) use client::encode_segment;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to the commerce API.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Transport failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The API rejected the request; `message` is the backend's own text.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API rejected submitted fields (HTTP 422).
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<(String, String)>,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The response did not match any accepted shape.
    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl CommerceError {
    /// Message suitable for showing to a shopper.
    ///
    /// Client errors carry the backend's text through; server and transport
    /// errors are replaced with a generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { status, message } if (400..500).contains(status) => message.clone(),
            Self::Validation { message, .. } => message.clone(),
            Self::NotFound(_) => "That item could not be found.".to_string(),
            Self::RateLimited(_) => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            Self::Http(e) if e.is_timeout() => {
                "The store is taking too long to respond. Please try again.".to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Whether the error is the backend's verdict on the shopper's input,
    /// as opposed to an outage.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status >= 400 && *status < 500,
            Self::Validation { .. } | Self::NotFound(_) | Self::RateLimited(_) => true,
            _ => false,
        }
    }
}
