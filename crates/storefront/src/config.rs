//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_API_URL` - Base URL of the commerce REST API (e.g., `https://api.larkspur.shop/v1`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `COMMERCE_API_TOKEN` - Bearer token for the commerce API
//! - `COMMERCE_ASSET_URL` - Base URL for relative image paths (default: API origin)
//! - `COMMERCE_API_TIMEOUT_SECS` - Request timeout (default: 15)
//! - `SITE_CONFIG_TTL_SECS` - Site/marketing config cache TTL (default: 300)
//! - `PRODUCT_CACHE_TTL_SECS` - Product cache TTL (default: 300)
//! - `GA4_MEASUREMENT_ID` - Google Analytics 4 measurement ID
//! - `META_PIXEL_ID` - Meta (Facebook) pixel ID
//! - `GTM_CONTAINER_ID` - Google Tag Manager container ID
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Substrings that mark a secret as copied from an example file.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "changeme",
    "change-me",
    "placeholder",
    "example",
    "your-",
    "secret",
    "password",
    "replace",
    "insert",
    "todo",
    "xxxx",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Commerce API connection settings
    pub commerce: CommerceApiConfig,
    /// In-memory cache lifetimes
    pub cache: CacheConfig,
    /// Analytics tracking configuration (environment defaults)
    pub analytics: AnalyticsConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Commerce API configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct CommerceApiConfig {
    /// Base URL all endpoint paths are joined onto
    pub base_url: Url,
    /// Base URL for resolving relative image paths
    pub asset_base_url: Url,
    /// Optional bearer token
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CommerceApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("asset_base_url", &self.asset_base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long site and marketing config stay cached
    pub site_config_ttl: Duration,
    /// How long product pages stay cached
    pub product_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            site_config_ttl: Duration::from_secs(300),
            product_ttl: Duration::from_secs(300),
        }
    }
}

/// Analytics and tracking IDs from the environment.
///
/// The marketing config served by the commerce API takes precedence; these
/// are used when it omits an ID.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    /// Google Analytics 4 measurement ID
    pub ga4_measurement_id: Option<String>,
    /// Meta (Facebook) pixel ID
    pub meta_pixel_id: Option<String>,
    /// Google Tag Manager container ID
    pub gtm_container_id: Option<String>,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = SecretPolicy::SESSION.load("STOREFRONT_SESSION_SECRET")?;

        let commerce = CommerceApiConfig::from_env()?;
        let cache = CacheConfig {
            site_config_ttl: Duration::from_secs(get_env_u64("SITE_CONFIG_TTL_SECS", 300)?),
            product_ttl: Duration::from_secs(get_env_u64("PRODUCT_CACHE_TTL_SECS", 300)?),
        };
        let analytics = AnalyticsConfig::from_env();

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            commerce,
            cache,
            analytics,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CommerceApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url("COMMERCE_API_URL", &get_required_env("COMMERCE_API_URL")?)?;
        let asset_base_url = match get_optional_env("COMMERCE_ASSET_URL") {
            Some(raw) => parse_base_url("COMMERCE_ASSET_URL", &raw)?,
            None => origin_of(&base_url),
        };

        Ok(Self {
            base_url,
            asset_base_url,
            api_token: get_optional_env("COMMERCE_API_TOKEN").map(SecretString::from),
            timeout: Duration::from_secs(get_env_u64("COMMERCE_API_TIMEOUT_SECS", 15)?),
        })
    }

    /// Build a config for a given API URL with default settings.
    ///
    /// Used by tests and tooling that point the client at a mock server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL cannot be parsed.
    pub fn for_url(api_url: &str) -> Result<Self, ConfigError> {
        let base_url = parse_base_url("COMMERCE_API_URL", api_url)?;
        Ok(Self {
            asset_base_url: origin_of(&base_url),
            base_url,
            api_token: None,
            timeout: Duration::from_secs(15),
        })
    }
}

impl AnalyticsConfig {
    fn from_env() -> Self {
        Self {
            ga4_measurement_id: get_optional_env("GA4_MEASUREMENT_ID"),
            meta_pixel_id: get_optional_env("META_PIXEL_ID"),
            gtm_container_id: get_optional_env("GTM_CONTAINER_ID"),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a numeric environment variable with a default value.
fn get_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a base URL, guaranteeing a trailing slash so relative joins append
/// to the path instead of replacing its last segment.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// The scheme + host + port of a URL, as a base URL.
fn origin_of(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

/// Minimum requirements for a signing secret.
#[derive(Debug, Clone, Copy)]
struct SecretPolicy {
    min_len: usize,
    /// Shannon entropy floor, in bits per byte.
    min_entropy: f64,
}

impl SecretPolicy {
    /// Cookie signing: long and random.
    const SESSION: Self = Self {
        min_len: 32,
        min_entropy: 3.3,
    };

    /// Read `key` from the environment and check it.
    fn load(self, key: &str) -> Result<SecretString, ConfigError> {
        let value = get_required_env(key)?;
        self.check(key, &value)?;
        Ok(SecretString::from(value))
    }

    fn check(self, key: &str, value: &str) -> Result<(), ConfigError> {
        let insecure = |reason: String| Err(ConfigError::InsecureSecret(key.to_string(), reason));

        if value.len() < self.min_len {
            return insecure(format!(
                "must be at least {} characters (got {})",
                self.min_len,
                value.len()
            ));
        }

        let lower = value.to_ascii_lowercase();
        if let Some(marker) = PLACEHOLDER_MARKERS.iter().find(|m| lower.contains(*m)) {
            return insecure(format!("looks like a placeholder (contains '{marker}')"));
        }

        let entropy = byte_entropy(value.as_bytes());
        if entropy < self.min_entropy {
            return insecure(format!(
                "too predictable ({entropy:.2} bits/byte, need {:.1}); generate it randomly",
                self.min_entropy
            ));
        }
        Ok(())
    }
}

/// Shannon entropy of a byte string, in bits per byte.
#[allow(clippy::cast_precision_loss)]
fn byte_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &b in bytes {
        if let Some(n) = counts.get_mut(usize::from(b)) {
            *n += 1;
        }
    }
    let total = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&n| n > 0)
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_entropy() {
        assert!(byte_entropy(b"").abs() < f64::EPSILON);
        assert!((byte_entropy(b"abab") - 1.0).abs() < 1e-9);
        assert!(byte_entropy(b"aaaaaaaa").abs() < f64::EPSILON);
    }

    #[test]
    fn test_session_policy_rejects_short_secret() {
        let err = SecretPolicy::SESSION.check("S", "Zq8#").unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_session_policy_rejects_placeholders() {
        let err = SecretPolicy::SESSION
            .check("S", "Please-ChangeMe-7f3a9c1e5b2d8f4a6c0e")
            .unwrap_err();
        assert!(err.to_string().contains("changeme"));
    }

    #[test]
    fn test_session_policy_rejects_repetitive_secret() {
        let result = SecretPolicy::SESSION.check("S", &"ab".repeat(20));
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_session_policy_accepts_random_secret() {
        assert!(
            SecretPolicy::SESSION
                .check("S", "k9#Lm2$vQ8!xR4@nT7&pW1^zY5*bC3%dF6")
                .is_ok()
        );
    }

    #[test]
    fn test_parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("K", "https://api.larkspur.test/v1").unwrap();
        assert_eq!(url.as_str(), "https://api.larkspur.test/v1/");
        assert_eq!(
            url.join("cart/add").unwrap().as_str(),
            "https://api.larkspur.test/v1/cart/add"
        );
    }

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        let result = parse_base_url("K", "ftp://files.larkspur.test");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_for_url_derives_asset_origin() {
        let config = CommerceApiConfig::for_url("http://127.0.0.1:9000/api/v2").unwrap();
        assert_eq!(config.asset_base_url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn test_commerce_config_debug_redacts_token() {
        let mut config = CommerceApiConfig::for_url("https://api.larkspur.test").unwrap();
        config.api_token = Some(SecretString::from("tok_live_8f7a6d5c4b3a"));

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("api.larkspur.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tok_live_8f7a6d5c4b3a"));
    }
}
