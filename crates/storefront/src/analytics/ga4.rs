//! Google Analytics 4 via gtag.js.

use larkspur_core::CurrencyCode;
use serde_json::{Map, Value, json};

use super::{AnalyticsAdapter, AnalyticsEvent, EventItem, amount, js_string, script_json};

/// GA4 adapter for one measurement ID.
#[derive(Debug, Clone)]
pub struct Ga4 {
    measurement_id: String,
}

impl Ga4 {
    #[must_use]
    pub const fn new(measurement_id: String) -> Self {
        Self { measurement_id }
    }
}

impl AnalyticsAdapter for Ga4 {
    fn name(&self) -> &'static str {
        "ga4"
    }

    fn script_src(&self) -> Option<String> {
        let id: String = url::form_urlencoded::byte_serialize(self.measurement_id.as_bytes()).collect();
        Some(format!("https://www.googletagmanager.com/gtag/js?id={id}"))
    }

    fn bootstrap(&self) -> String {
        // Page views are sent explicitly so redirects don't double count.
        format!(
            "window.dataLayer=window.dataLayer||[];\
             function gtag(){{dataLayer.push(arguments);}}\
             gtag('js',new Date());\
             gtag('config',{},{{send_page_view:false}});",
            js_string(&self.measurement_id)
        )
    }

    fn render_event(&self, event: &AnalyticsEvent, currency: CurrencyCode) -> Option<String> {
        let (name, params) = match event {
            AnalyticsEvent::PageView { path, title } => (
                "page_view",
                json!({ "page_path": path, "page_title": title }),
            ),
            other => ecommerce_payload(other, currency)?,
        };
        Some(format!(
            "gtag('event',{},{});",
            js_string(name),
            script_json(&params)
        ))
    }
}

/// GA4 recommended event name and parameters for a commerce event.
///
/// Shared with the Tag Manager adapter, whose data layer uses the same
/// ecommerce schema. Returns `None` for page views.
pub(super) fn ecommerce_payload(
    event: &AnalyticsEvent,
    currency: CurrencyCode,
) -> Option<(&'static str, Value)> {
    let code = currency.code();
    let payload = match event {
        AnalyticsEvent::PageView { .. } => return None,
        AnalyticsEvent::ViewItemList { list_name, items } => (
            "view_item_list",
            json!({ "item_list_name": list_name, "items": items_json(items) }),
        ),
        AnalyticsEvent::ViewItem { item } => ("view_item", single_item(code, item)),
        AnalyticsEvent::AddToCart { item } => ("add_to_cart", single_item(code, item)),
        AnalyticsEvent::RemoveFromCart { item } => ("remove_from_cart", single_item(code, item)),
        AnalyticsEvent::ViewCart { items, value } => (
            "view_cart",
            json!({ "currency": code, "value": amount(*value), "items": items_json(items) }),
        ),
        AnalyticsEvent::BeginCheckout { checkout } => {
            ("begin_checkout", checkout_params(code, checkout, None))
        }
        AnalyticsEvent::AddShippingInfo {
            checkout,
            shipping_tier,
        } => (
            "add_shipping_info",
            checkout_params(code, checkout, shipping_tier.as_deref().map(|t| ("shipping_tier", t))),
        ),
        AnalyticsEvent::AddPaymentInfo {
            checkout,
            payment_type,
        } => (
            "add_payment_info",
            checkout_params(code, checkout, payment_type.as_deref().map(|t| ("payment_type", t))),
        ),
        AnalyticsEvent::Purchase {
            transaction_id,
            value,
            tax,
            shipping,
            coupon,
            items,
        } => {
            let mut params = json!({
                "transaction_id": transaction_id,
                "currency": code,
                "value": amount(*value),
                "tax": amount(*tax),
                "shipping": amount(*shipping),
                "items": items_json(items),
            });
            if let (Some(coupon), Value::Object(obj)) = (coupon, &mut params) {
                obj.insert("coupon".into(), Value::String(coupon.clone()));
            }
            ("purchase", params)
        }
        AnalyticsEvent::Search { term } => ("search", json!({ "search_term": term })),
    };
    Some(payload)
}

fn single_item(currency: &str, item: &EventItem) -> Value {
    json!({
        "currency": currency,
        "value": amount(item.value()),
        "items": [item_json(item)],
    })
}

fn checkout_params(
    currency: &str,
    checkout: &super::CheckoutSnapshot,
    extra: Option<(&str, &str)>,
) -> Value {
    let mut params = Map::new();
    params.insert("currency".into(), Value::from(currency));
    params.insert("value".into(), amount(checkout.value));
    if let Some(coupon) = &checkout.coupon {
        params.insert("coupon".into(), Value::String(coupon.clone()));
    }
    if let Some((key, value)) = extra {
        params.insert(key.into(), Value::from(value));
    }
    params.insert("items".into(), items_json(&checkout.items));
    Value::Object(params)
}

fn items_json(items: &[EventItem]) -> Value {
    Value::Array(items.iter().map(item_json).collect())
}

fn item_json(item: &EventItem) -> Value {
    let mut obj = Map::new();
    obj.insert("item_id".into(), Value::String(item.item_id.clone()));
    obj.insert("item_name".into(), Value::String(item.item_name.clone()));
    if let Some(variant) = &item.item_variant {
        obj.insert("item_variant".into(), Value::String(variant.clone()));
    }
    if let Some(category) = &item.item_category {
        obj.insert("item_category".into(), Value::String(category.clone()));
    }
    obj.insert("price".into(), amount(item.price));
    obj.insert("quantity".into(), Value::from(item.quantity));
    Value::Object(obj)
}
