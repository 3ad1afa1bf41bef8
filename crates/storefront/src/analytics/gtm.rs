//! Google Tag Manager data layer.

use larkspur_core::CurrencyCode;
use serde_json::json;

use super::ga4::ecommerce_payload;
use super::{AnalyticsAdapter, AnalyticsEvent, js_string, script_json};

/// Tag Manager adapter for one container.
#[derive(Debug, Clone)]
pub struct TagManager {
    container_id: String,
}

impl TagManager {
    #[must_use]
    pub const fn new(container_id: String) -> Self {
        Self { container_id }
    }
}

impl AnalyticsAdapter for TagManager {
    fn name(&self) -> &'static str {
        "gtm"
    }

    fn script_src(&self) -> Option<String> {
        let id: String = url::form_urlencoded::byte_serialize(self.container_id.as_bytes()).collect();
        Some(format!("https://www.googletagmanager.com/gtm.js?id={id}"))
    }

    fn bootstrap(&self) -> String {
        format!(
            "window.dataLayer=window.dataLayer||[];\
             dataLayer.push({{'gtm.start':new Date().getTime(),event:'gtm.js','gtm.container':{}}});",
            js_string(&self.container_id)
        )
    }

    fn render_event(&self, event: &AnalyticsEvent, currency: CurrencyCode) -> Option<String> {
        if let AnalyticsEvent::PageView { path, title } = event {
            let payload = json!({ "event": "page_view", "page_path": path, "page_title": title });
            return Some(format!("dataLayer.push({});", script_json(&payload)));
        }

        let (name, ecommerce) = ecommerce_payload(event, currency)?;
        let payload = json!({ "event": name, "ecommerce": ecommerce });
        // Clear the previous ecommerce object so fields don't leak between events.
        Some(format!(
            "dataLayer.push({{ecommerce:null}});dataLayer.push({});",
            script_json(&payload)
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_script_src_encodes_container() {
        assert_eq!(
            TagManager::new("GTM-AB12".into()).script_src().unwrap(),
            "https://www.googletagmanager.com/gtm.js?id=GTM-AB12"
        );
    }

    #[test]
    fn test_ecommerce_event_resets_first() {
        let js = TagManager::new("GTM-1".into())
            .render_event(
                &AnalyticsEvent::Search {
                    term: "teapot".into(),
                },
                CurrencyCode::USD,
            )
            .unwrap();
        assert!(js.starts_with("dataLayer.push({ecommerce:null});"));
        assert!(js.contains("\"event\":\"search\""));
        assert!(js.contains("\"search_term\":\"teapot\""));
    }
}
