//! Data shared by every full page: site chrome, flashes, analytics.

use std::sync::Arc;

use tower_sessions::Session;

use crate::analytics::{AnalyticsEvent, Consent, Tracker};
use crate::middleware::CspNonce;
use crate::models::{Flash, session};
use crate::site_config::SiteConfig;
use crate::state::AppState;

/// Pinned htmx build loaded by the base template.
pub const HTMX_SRC: &str = "https://unpkg.com/htmx.org@2.0.4/dist/htmx.min.js";

const DEFAULT_CONSENT_TEXT: &str =
    "We use cookies to measure visits and improve the store. Is that okay?";

/// Base template context.
pub struct Layout {
    pub site: Arc<SiteConfig>,
    pub page_title: String,
    pub path: String,
    pub nonce: String,
    pub htmx_src: &'static str,
    pub flashes: Vec<Flash>,
    /// Pre-rendered analytics `<script>` elements (empty without consent).
    pub analytics: String,
    pub show_consent_banner: bool,
    pub consent_text: String,
    pub privacy_policy_url: Option<String>,
}

/// Describes the page being rendered.
pub struct Page {
    title: String,
    path: String,
    events: Vec<AnalyticsEvent>,
}

impl Page {
    #[must_use]
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
            events: Vec::new(),
        }
    }

    /// Report `event` on this page.
    #[must_use]
    pub fn event(mut self, event: AnalyticsEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Report `event` on this page if there is one.
    #[must_use]
    pub fn maybe_event(mut self, event: Option<AnalyticsEvent>) -> Self {
        self.events.extend(event);
        self
    }

    /// Resolve the layout.
    ///
    /// Consumes the session's flashes and queued analytics events, so call
    /// this only for responses that are actually rendered.
    pub async fn layout(self, state: &AppState, session: &Session, nonce: &CspNonce) -> Layout {
        let site = state.site_config().site().await;
        let marketing = state.site_config().marketing().await;
        let consent = Consent::load(session).await;

        let mut tracker = Tracker::new(&marketing, consent, site.currency);
        tracker.track(AnalyticsEvent::PageView {
            path: self.path.clone(),
            title: self.title.clone(),
        });
        tracker.track_all(session::take_events(session).await);
        tracker.track_all(self.events);

        let page_title = if self.title.is_empty() {
            site.store_name.clone()
        } else {
            format!("{} | {}", self.title, site.store_name)
        };

        Layout {
            page_title,
            path: self.path,
            nonce: nonce.value().to_string(),
            htmx_src: HTMX_SRC,
            flashes: Flash::take_all(session).await,
            analytics: tracker.render(nonce.value()),
            // Nothing to consent to when no provider is configured.
            show_consent_banner: tracker.show_banner() && marketing.has_providers(),
            consent_text: marketing
                .consent_banner_text
                .clone()
                .unwrap_or_else(|| DEFAULT_CONSENT_TEXT.to_string()),
            privacy_policy_url: marketing.privacy_policy_url.clone(),
            site,
        }
    }
}
