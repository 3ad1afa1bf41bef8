//! Meta (Facebook) Pixel.

use larkspur_core::CurrencyCode;
use serde_json::{Value, json};

use super::{AnalyticsAdapter, AnalyticsEvent, EventItem, amount, js_string, script_json};

/// Meta Pixel adapter for one pixel ID.
#[derive(Debug, Clone)]
pub struct MetaPixel {
    pixel_id: String,
}

impl MetaPixel {
    #[must_use]
    pub const fn new(pixel_id: String) -> Self {
        Self { pixel_id }
    }
}

impl AnalyticsAdapter for MetaPixel {
    fn name(&self) -> &'static str {
        "meta_pixel"
    }

    fn script_src(&self) -> Option<String> {
        None
    }

    fn bootstrap(&self) -> String {
        format!(
            "!function(f,b,e,v,n,t,s){{if(f.fbq)return;n=f.fbq=function(){{n.callMethod?\
             n.callMethod.apply(n,arguments):n.queue.push(arguments)}};\
             if(!f._fbq)f._fbq=n;n.push=n;n.loaded=!0;n.version='2.0';\
             n.queue=[];t=b.createElement(e);t.async=!0;\
             t.src=v;s=b.getElementsByTagName(e)[0];\
             s.parentNode.insertBefore(t,s)}}(window,document,'script',\
             'https://connect.facebook.net/en_US/fbevents.js');\
             fbq('init',{});fbq('track','PageView');",
            js_string(&self.pixel_id)
        )
    }

    fn render_event(&self, event: &AnalyticsEvent, currency: CurrencyCode) -> Option<String> {
        let code = currency.code();
        let (name, params) = match event {
            AnalyticsEvent::ViewItem { item } => ("ViewContent", content_params(code, item)),
            AnalyticsEvent::AddToCart { item } => ("AddToCart", content_params(code, item)),
            AnalyticsEvent::BeginCheckout { checkout } => (
                "InitiateCheckout",
                json!({
                    "currency": code,
                    "value": amount(checkout.value),
                    "num_items": num_items(&checkout.items),
                    "content_ids": content_ids(&checkout.items),
                    "content_type": "product",
                }),
            ),
            AnalyticsEvent::AddPaymentInfo { checkout, .. } => (
                "AddPaymentInfo",
                json!({
                    "currency": code,
                    "value": amount(checkout.value),
                    "content_ids": content_ids(&checkout.items),
                }),
            ),
            AnalyticsEvent::Purchase { value, items, .. } => (
                "Purchase",
                json!({
                    "currency": code,
                    "value": amount(*value),
                    "num_items": num_items(items),
                    "content_ids": content_ids(items),
                    "content_type": "product",
                }),
            ),
            AnalyticsEvent::Search { term } => ("Search", json!({ "search_string": term })),
            // PageView is part of the bootstrap; the rest have no standard event.
            AnalyticsEvent::PageView { .. }
            | AnalyticsEvent::ViewItemList { .. }
            | AnalyticsEvent::RemoveFromCart { .. }
            | AnalyticsEvent::ViewCart { .. }
            | AnalyticsEvent::AddShippingInfo { .. } => return None,
        };
        Some(format!(
            "fbq('track',{},{});",
            js_string(name),
            script_json(&params)
        ))
    }
}

fn content_params(currency: &str, item: &EventItem) -> Value {
    json!({
        "currency": currency,
        "value": amount(item.value()),
        "content_ids": [item.item_id],
        "content_name": item.item_name,
        "content_type": "product",
    })
}

fn content_ids(items: &[EventItem]) -> Vec<&str> {
    items.iter().map(|i| i.item_id.as_str()).collect()
}

fn num_items(items: &[EventItem]) -> u32 {
    items.iter().map(|i| i.quantity).sum()
}
