//! Application error type and its HTTP mapping.
//!
//! Handlers return `Result<T, AppError>` for failures that end the request.
//! Failures the shopper can act on (a rejected coupon, an out-of-stock line)
//! are turned into flash messages by the handlers instead and never get here.
//!
//! Server-side failures are reported to Sentry; the response body only ever
//! carries a generic message.

use axum::{
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::commerce::CommerceError;

/// Storefront request failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Commerce error: {0}")]
    Commerce(#[from] CommerceError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(CommerceError::NotFound(_)) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Commerce(CommerceError::RateLimited(_)) | Self::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Commerce(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the shopper. Backend and internal details stay in logs.
    fn public_message(&self) -> String {
        match self {
            Self::Commerce(CommerceError::NotFound(_)) | Self::NotFound(_) => {
                "Not found".to_string()
            }
            Self::Commerce(CommerceError::RateLimited(_)) | Self::RateLimited => {
                "Too many requests. Please try again shortly.".to_string()
            }
            Self::Commerce(_) => "The store is temporarily unavailable".to_string(),
            Self::Session(_) | Self::Internal(_) => "Something went wrong on our end".to_string(),
            Self::BadRequest(reason) => format!("Bad request: {reason}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let mut response = (status, self.public_message()).into_response();
        if let Self::Commerce(CommerceError::RateLimited(seconds)) = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Record a shopper action as a Sentry breadcrumb.
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "1042")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let data = data
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
        .collect();

    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        data,
        ..Default::default()
    });
}
