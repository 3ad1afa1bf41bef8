//! Content Security Policy.
//!
//! Every response gets a fresh nonce; inline scripts (analytics bootstrap,
//! page scripts) must carry it. Third-party hosts are only allowed when the
//! feature that needs them is configured.

use axum::{extract::FromRequestParts, http::request::Parts};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Host serving the htmx script.
pub const HTMX_HOST: &str = "https://unpkg.com";

/// A CSP nonce value for inline scripts.
///
/// 128 random bits, base64-encoded.
#[derive(Clone, Debug)]
pub struct CspNonce(pub String);

impl CspNonce {
    /// Generate a new random nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    /// Get the nonce value for use in templates.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Extractor for the nonce placed in request extensions by
/// [`security_headers_middleware`](super::security_headers_middleware).
impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!("CSP nonce missing from request extensions; inline scripts will be blocked");
            Self(String::new())
        }))
    }
}

/// Inputs that widen the default policy.
#[derive(Debug, Clone, Default)]
pub struct CspSources {
    /// Origins serving product and storefront images.
    pub image_origins: Vec<String>,
    /// Google Analytics or Tag Manager is configured.
    pub google: bool,
    /// Meta Pixel is configured.
    pub meta: bool,
    /// Ask browsers to upgrade `http:` subresources.
    pub upgrade_insecure: bool,
}

/// Build the `Content-Security-Policy` header value.
#[must_use]
pub fn build_policy(nonce: &str, sources: &CspSources) -> String {
    let mut script = vec!["'self'".to_string(), format!("'nonce-{nonce}'"), HTMX_HOST.to_string()];
    let mut img = vec!["'self'", "data:"]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let mut connect = vec!["'self'".to_string()];

    for origin in &sources.image_origins {
        if origin != "null" && !img.contains(origin) {
            img.push(origin.clone());
        }
    }
    if sources.google {
        script.push("https://www.googletagmanager.com".into());
        img.push("https://*.google-analytics.com".into());
        img.push("https://www.googletagmanager.com".into());
        connect.push("https://*.google-analytics.com".into());
        connect.push("https://*.analytics.google.com".into());
        connect.push("https://www.googletagmanager.com".into());
    }
    if sources.meta {
        script.push("https://connect.facebook.net".into());
        img.push("https://www.facebook.com".into());
        connect.push("https://www.facebook.com".into());
        connect.push("https://connect.facebook.net".into());
    }

    let mut directives = vec![
        "default-src 'none'".to_string(),
        format!("script-src {}", script.join(" ")),
        "style-src 'self'".to_string(),
        "font-src 'self'".to_string(),
        format!("img-src {}", img.join(" ")),
        format!("connect-src {}", connect.join(" ")),
        "media-src 'self' https:".to_string(),
        "frame-src 'none'".to_string(),
        "object-src 'none'".to_string(),
        "base-uri 'self'".to_string(),
        "form-action 'self'".to_string(),
        "frame-ancestors 'none'".to_string(),
    ];
    if sources.upgrade_insecure {
        directives.push("upgrade-insecure-requests".to_string());
    }
    directives.join("; ")
}
