//! Application state shared across handlers.

use std::sync::Arc;

use crate::commerce::{CommerceClient, CommerceError};
use crate::config::StorefrontConfig;
use crate::site_config::SiteConfigLoader;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration, the commerce API client and the config loader.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    commerce: CommerceClient,
    site_config: SiteConfigLoader,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the commerce API client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, CommerceError> {
        let commerce = CommerceClient::new(&config.commerce, &config.cache)?;
        let site_config = SiteConfigLoader::new(
            commerce.clone(),
            config.analytics.clone(),
            config.cache.site_config_ttl,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                commerce,
                site_config,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the commerce API client.
    #[must_use]
    pub fn commerce(&self) -> &CommerceClient {
        &self.inner.commerce
    }

    /// Get a reference to the site and marketing config loader.
    #[must_use]
    pub fn site_config(&self) -> &SiteConfigLoader {
        &self.inner.site_config
    }
}
