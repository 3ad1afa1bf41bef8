//! Site and marketing configuration served by the commerce API.
//!
//! Both documents are cached in memory for `SITE_CONFIG_TTL_SECS`. Concurrent
//! requests for a cold entry share one backend call. When the backend is
//! unreachable or returns something unreadable, the loader logs a warning
//! and hands out built-in defaults without caching them, so the next request
//! tries again.
//!
//! Image references in the site document (logo, hero artwork, social icons)
//! are resolved against the asset base URL the same way product images are.

use std::collections::BTreeSet;
use std::sync::Arc;

use larkspur_core::CurrencyCode;
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{instrument, warn};
use url::Url;

use crate::commerce::normalize::{resolve_url, strip_nulls};
use crate::commerce::{CommerceClient, CommerceError};
use crate::config::AnalyticsConfig;
use crate::hero::HeroContent;

/// Link to a social profile shown in the footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    #[serde(alias = "platform")]
    pub name: String,
    pub url: String,
    #[serde(default, alias = "icon_url")]
    pub icon: Option<String>,
}

/// Store-wide presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    #[serde(alias = "name", alias = "site_name")]
    pub store_name: String,
    pub tagline: Option<String>,
    #[serde(alias = "logo")]
    pub logo_url: Option<String>,
    #[serde(alias = "contact_email")]
    pub support_email: Option<String>,
    #[serde(deserialize_with = "lenient_currency")]
    pub currency: CurrencyCode,
    #[serde(alias = "announcement_bar")]
    pub announcement: Option<String>,
    pub free_shipping_threshold: Option<Decimal>,
    #[serde(alias = "hero_style", alias = "hero_layout")]
    pub hero_variant: String,
    pub hero: HeroContent,
    #[serde(alias = "social")]
    pub social_links: Vec<SocialLink>,
    pub footer_text: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            store_name: "Larkspur".to_string(),
            tagline: Some("Goods for slow mornings".to_string()),
            logo_url: None,
            support_email: None,
            currency: CurrencyCode::default(),
            announcement: None,
            free_shipping_threshold: None,
            hero_variant: "classic".to_string(),
            hero: HeroContent::default(),
            social_links: Vec::new(),
            footer_text: None,
        }
    }
}

impl SiteConfig {
    /// Resolve every image reference against `assets`.
    ///
    /// References that cannot be resolved are dropped.
    pub fn resolve_images(&mut self, assets: &Url) {
        let resolve = |raw: Option<String>| raw.and_then(|raw| resolve_url(&raw, assets));

        self.logo_url = resolve(self.logo_url.take());
        self.hero.image_url = resolve(self.hero.image_url.take());
        self.hero.images = std::mem::take(&mut self.hero.images)
            .into_iter()
            .filter_map(|raw| resolve_url(&raw, assets))
            .collect();
        for link in &mut self.social_links {
            link.icon = resolve(link.icon.take());
        }
    }

    /// Distinct origins the configured images are served from.
    #[must_use]
    pub fn image_origins(&self) -> Vec<String> {
        self.logo_url
            .iter()
            .chain(&self.hero.image_url)
            .chain(&self.hero.images)
            .chain(self.social_links.iter().filter_map(|l| l.icon.as_ref()))
            .filter_map(|raw| Url::parse(raw).ok())
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .map(|url| url.origin().ascii_serialization())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Tracking and consent settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketingConfig {
    #[serde(alias = "ga4_id", alias = "google_analytics_id")]
    pub ga4_measurement_id: Option<String>,
    #[serde(alias = "facebook_pixel_id", alias = "fb_pixel_id")]
    pub meta_pixel_id: Option<String>,
    #[serde(alias = "gtm_id")]
    pub gtm_container_id: Option<String>,
    pub consent_required: bool,
    pub consent_banner_text: Option<String>,
    pub privacy_policy_url: Option<String>,
}

impl Default for MarketingConfig {
    fn default() -> Self {
        Self {
            ga4_measurement_id: None,
            meta_pixel_id: None,
            gtm_container_id: None,
            consent_required: true,
            consent_banner_text: None,
            privacy_policy_url: None,
        }
    }
}

impl MarketingConfig {
    /// Fill tracking IDs the backend left out from the environment.
    ///
    /// Blank IDs count as absent.
    #[must_use]
    pub fn with_env_fallback(self, env: &AnalyticsConfig) -> Self {
        let pick = |backend: Option<String>, env: &Option<String>| {
            backend
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .or_else(|| env.clone())
        };
        Self {
            ga4_measurement_id: pick(self.ga4_measurement_id, &env.ga4_measurement_id),
            meta_pixel_id: pick(self.meta_pixel_id, &env.meta_pixel_id),
            gtm_container_id: pick(self.gtm_container_id, &env.gtm_container_id),
            ..self
        }
    }

    /// Whether any tracking provider is configured.
    #[must_use]
    pub const fn has_providers(&self) -> bool {
        self.ga4_measurement_id.is_some()
            || self.meta_pixel_id.is_some()
            || self.gtm_container_id.is_some()
    }
}

fn lenient_currency<'de, D>(deserializer: D) -> Result<CurrencyCode, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|code| {
            code.parse::<CurrencyCode>()
                .inspect_err(|_| tracing::debug!(code, "Unsupported store currency"))
                .ok()
        })
        .unwrap_or_default())
}

/// Failure to obtain a configuration document.
#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error(transparent)]
    Commerce(#[from] CommerceError),
    #[error("invalid configuration: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Cached loader for [`SiteConfig`] and [`MarketingConfig`].
#[derive(Clone)]
pub struct SiteConfigLoader {
    client: CommerceClient,
    env: AnalyticsConfig,
    site: Cache<(), Arc<SiteConfig>>,
    marketing: Cache<(), Arc<MarketingConfig>>,
}

impl SiteConfigLoader {
    /// Create a loader caching each document for `ttl`.
    #[must_use]
    pub fn new(client: CommerceClient, env: AnalyticsConfig, ttl: std::time::Duration) -> Self {
        Self {
            client,
            env,
            site: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            marketing: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    /// Current site configuration, or defaults if it cannot be loaded.
    #[instrument(skip(self))]
    pub async fn site(&self) -> Arc<SiteConfig> {
        let client = self.client.clone();
        self.site
            .try_get_with((), async move {
                let mut value = client.site_config().await?;
                strip_nulls(&mut value);
                let mut config = serde_json::from_value::<SiteConfig>(value)?;
                config.resolve_images(client.asset_base_url());
                Ok::<_, LoadError>(Arc::new(config))
            })
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load site config, using defaults");
                Arc::new(SiteConfig::default())
            })
    }

    /// Current marketing configuration, or defaults if it cannot be loaded.
    ///
    /// Environment tracking IDs fill gaps in both cases.
    #[instrument(skip(self))]
    pub async fn marketing(&self) -> Arc<MarketingConfig> {
        let client = self.client.clone();
        let env = self.env.clone();
        self.marketing
            .try_get_with((), async move {
                let mut value = client.marketing_config().await?;
                strip_nulls(&mut value);
                let config = serde_json::from_value::<MarketingConfig>(value)?;
                Ok::<_, LoadError>(Arc::new(config.with_env_fallback(&env)))
            })
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load marketing config, using defaults");
                Arc::new(MarketingConfig::default().with_env_fallback(&self.env))
            })
    }

    /// Drop both cached documents.
    pub fn invalidate(&self) {
        self.site.invalidate_all();
        self.marketing.invalidate_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{CacheConfig, CommerceApiConfig};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn loader_for(server: &MockServer, env: AnalyticsConfig) -> SiteConfigLoader {
        let config = CommerceApiConfig::for_url(&server.uri()).unwrap();
        let client = CommerceClient::new(&config, &CacheConfig::default()).unwrap();
        SiteConfigLoader::new(client, env, Duration::from_secs(60))
    }

    #[test]
    fn test_site_config_fills_missing_fields() {
        let config: SiteConfig = serde_json::from_value(json!({
            "name": "Fern & Flint",
            "currency": "eur",
            "hero_style": "split-left"
        }))
        .unwrap();
        assert_eq!(config.store_name, "Fern & Flint");
        assert_eq!(config.currency, CurrencyCode::EUR);
        assert_eq!(config.hero_variant, "split-left");
        assert!(config.social_links.is_empty());
        assert_eq!(config.tagline, SiteConfig::default().tagline);
    }

    #[test]
    fn test_unknown_currency_defaults() {
        let config: SiteConfig = serde_json::from_value(json!({"currency": "XYZ"})).unwrap();
        assert_eq!(config.currency, CurrencyCode::USD);
    }

    #[test]
    fn test_marketing_backend_ids_override_env() {
        let env = AnalyticsConfig {
            ga4_measurement_id: Some("G-ENV".into()),
            meta_pixel_id: Some("111".into()),
            gtm_container_id: None,
        };
        let config = MarketingConfig {
            ga4_measurement_id: Some("G-BACKEND".into()),
            meta_pixel_id: Some("  ".into()),
            ..MarketingConfig::default()
        }
        .with_env_fallback(&env);
        assert_eq!(config.ga4_measurement_id.as_deref(), Some("G-BACKEND"));
        assert_eq!(config.meta_pixel_id.as_deref(), Some("111"));
        assert!(config.gtm_container_id.is_none());
        assert!(config.consent_required);
    }

    #[tokio::test]
    async fn test_site_config_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/site"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"store_name": "Kiln"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let loader = loader_for(&server, AnalyticsConfig::default());
        assert_eq!(loader.site().await.store_name, "Kiln");
        assert_eq!(loader.site().await.store_name, "Kiln");
    }

    #[tokio::test]
    async fn test_null_fields_keep_the_rest_of_the_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/site"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"store_name": "Kiln", "hero_variant": null, "social_links": null,
                         "currency": null, "tagline": null}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/config/marketing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ga4_measurement_id": "G-KILN", "consent_required": null
            })))
            .mount(&server)
            .await;

        let loader = loader_for(&server, AnalyticsConfig::default());
        let site = loader.site().await;
        assert_eq!(site.store_name, "Kiln");
        assert_eq!(site.hero_variant, SiteConfig::default().hero_variant);
        assert!(site.social_links.is_empty());
        assert_eq!(site.currency, CurrencyCode::USD);
        assert_eq!(site.tagline, SiteConfig::default().tagline);

        let marketing = loader.marketing().await;
        assert_eq!(marketing.ga4_measurement_id.as_deref(), Some("G-KILN"));
        assert!(marketing.consent_required);
    }

    #[tokio::test]
    async fn test_site_images_resolve_against_asset_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/site"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "store_name": "Kiln",
                "logo": "/media/logo.svg",
                "hero": {
                    "image_url": "https://images.kiln.example/hero.jpg",
                    "images": ["/media/a.jpg", "  ", "//cdn.kiln.example/b.jpg"]
                },
                "social_links": [
                    {"platform": "Instagram", "url": "https://instagram.com/kiln", "icon_url": "icons/ig.svg"}
                ]
            })))
            .mount(&server)
            .await;

        let loader = loader_for(&server, AnalyticsConfig::default());
        let site = loader.site().await;
        let base = server.uri();
        assert_eq!(site.logo_url, Some(format!("{base}/media/logo.svg")));
        assert_eq!(
            site.hero.images,
            vec![format!("{base}/media/a.jpg"), "https://cdn.kiln.example/b.jpg".to_string()]
        );
        let icon = site.social_links.first().and_then(|l| l.icon.clone()).unwrap();
        assert!(icon.starts_with(&base) && icon.ends_with("/icons/ig.svg"));

        let origins = site.image_origins();
        assert_eq!(
            origins,
            vec![
                base,
                "https://cdn.kiln.example".to_string(),
                "https://images.kiln.example".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_returns_defaults_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/site"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let loader = loader_for(&server, AnalyticsConfig::default());
        assert_eq!(*loader.site().await, SiteConfig::default());
        assert_eq!(*loader.site().await, SiteConfig::default());
    }

    #[tokio::test]
    async fn test_marketing_failure_keeps_env_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/marketing"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let env = AnalyticsConfig {
            gtm_container_id: Some("GTM-ABC123".into()),
            ..AnalyticsConfig::default()
        };
        let loader = loader_for(&server, env);
        let marketing = loader.marketing().await;
        assert_eq!(marketing.gtm_container_id.as_deref(), Some("GTM-ABC123"));
        assert!(marketing.consent_required);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config/marketing"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"consent_required": false})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let loader = loader_for(&server, AnalyticsConfig::default());
        assert!(!loader.marketing().await.consent_required);
        loader.invalidate();
        assert!(!loader.marketing().await.consent_required);
    }
}
