//! Consent-gated marketing analytics.
//!
//! # Architecture
//!
//! - Handlers describe what happened as [`AnalyticsEvent`]s
//! - A per-request [`Tracker`] holds the adapters that are both configured
//!   (tracking ID present) and allowed (visitor consent, or consent not
//!   required by the marketing config)
//! - The tracker renders nonce-tagged `<script>` elements for the page; a
//!   tracker with nothing enabled renders an empty string
//!
//! # Example
//!
//! ```rust,ignore
//! let mut tracker = Tracker::new(&marketing, consent, site.currency);
//! tracker.track(AnalyticsEvent::ViewItem { item: (&product).into() });
//! let html = tracker.render(nonce.value());
//! ```

mod event;
mod ga4;
mod gtm;
mod meta;

pub use event::{AnalyticsEvent, CheckoutSnapshot, EventItem};
pub use ga4::Ga4;
pub use gtm::TagManager;
pub use meta::MetaPixel;

use std::fmt::Write as _;

use larkspur_core::CurrencyCode;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;

use crate::site_config::MarketingConfig;

/// A tracking provider.
pub trait AnalyticsAdapter: Send + Sync {
    /// Short provider name, used in logs.
    fn name(&self) -> &'static str;

    /// External script loaded with `async`, if the provider needs one.
    fn script_src(&self) -> Option<String>;

    /// Inline setup code run once per page.
    fn bootstrap(&self) -> String;

    /// JavaScript statement reporting `event`, or `None` if the provider has
    /// no equivalent.
    fn render_event(&self, event: &AnalyticsEvent, currency: CurrencyCode) -> Option<String>;
}

// =============================================================================
// Consent
// =============================================================================

/// Session key holding the visitor's consent decision.
const CONSENT_KEY: &str = "analytics_consent";

/// The visitor's analytics consent decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consent {
    /// Not asked yet.
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl Consent {
    /// Parse a consent form value.
    #[must_use]
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim().to_ascii_lowercase().as_str() {
            "grant" | "granted" | "accept" | "yes" => Some(Self::Granted),
            "deny" | "denied" | "reject" | "decline" | "no" => Some(Self::Denied),
            _ => None,
        }
    }

    /// Read the decision stored in the session.
    pub async fn load(session: &Session) -> Self {
        session
            .get::<Self>(CONSENT_KEY)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }

    /// Store the decision in the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn store(self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(CONSENT_KEY, self).await
    }
}

// =============================================================================
// Tracker
// =============================================================================

/// The analytics adapters active for one request, plus the events to report.
pub struct Tracker {
    adapters: Vec<Box<dyn AnalyticsAdapter>>,
    currency: CurrencyCode,
    events: Vec<AnalyticsEvent>,
    show_banner: bool,
}

impl Tracker {
    /// Build the tracker for a visitor.
    ///
    /// Only providers with a configured ID are enabled, and only when the
    /// visitor granted consent or the store does not require it.
    #[must_use]
    pub fn new(marketing: &MarketingConfig, consent: Consent, currency: CurrencyCode) -> Self {
        let allowed = !marketing.consent_required || consent == Consent::Granted;

        let mut adapters: Vec<Box<dyn AnalyticsAdapter>> = Vec::new();
        if allowed {
            if let Some(id) = configured(marketing.gtm_container_id.as_deref()) {
                adapters.push(Box::new(TagManager::new(id)));
            }
            if let Some(id) = configured(marketing.ga4_measurement_id.as_deref()) {
                adapters.push(Box::new(Ga4::new(id)));
            }
            if let Some(id) = configured(marketing.meta_pixel_id.as_deref()) {
                adapters.push(Box::new(MetaPixel::new(id)));
            }
        }

        Self {
            adapters,
            currency,
            events: Vec::new(),
            show_banner: marketing.consent_required && consent == Consent::Unknown,
        }
    }

    /// Whether any provider will receive events.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.adapters.is_empty()
    }

    /// Names of the enabled providers.
    #[must_use]
    pub fn providers(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Whether the consent banner should be shown.
    #[must_use]
    pub const fn show_banner(&self) -> bool {
        self.show_banner
    }

    /// Queue an event for this page.
    pub fn track(&mut self, event: AnalyticsEvent) {
        self.events.push(event);
    }

    /// Queue several events for this page.
    pub fn track_all(&mut self, events: impl IntoIterator<Item = AnalyticsEvent>) {
        self.events.extend(events);
    }

    /// Render the provider scripts and queued events.
    ///
    /// Every `<script>` carries `nonce`. Empty when no provider is enabled.
    #[must_use]
    pub fn render(&self, nonce: &str) -> String {
        let mut html = String::new();
        for adapter in &self.adapters {
            if let Some(src) = adapter.script_src() {
                let _ = write!(
                    html,
                    r#"<script async nonce="{nonce}" src="{}"></script>"#,
                    attr_escape(&src)
                );
            }

            let mut body = adapter.bootstrap();
            for event in &self.events {
                if let Some(js) = adapter.render_event(event, self.currency) {
                    body.push_str(&js);
                }
            }
            let _ = write!(html, r#"<script nonce="{nonce}">{body}</script>"#);
        }
        html
    }
}

fn configured(id: Option<&str>) -> Option<String> {
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
}

// =============================================================================
// Script helpers
// =============================================================================

/// Serialize JSON for inclusion inside an inline `<script>`.
///
/// Escapes characters that could close the script element or break a
/// JavaScript string literal.
pub(crate) fn script_json(value: &Value) -> String {
    let mut out = String::new();
    for c in value.to_string().chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

/// JavaScript string literal for `s`.
pub(crate) fn js_string(s: &str) -> String {
    script_json(&Value::String(s.to_string()))
}

/// Monetary amount as a JSON number.
pub(crate) fn amount(value: Decimal) -> Value {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .map_or(Value::Null, Value::from)
}

fn attr_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
