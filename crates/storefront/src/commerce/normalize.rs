//! Response-shape normalization for the commerce API.
//!
//! Endpoints of the commerce API disagree about envelopes and field names.
//! This module reduces every accepted shape to one canonical JSON value
//! before it is decoded into the typed records in [`super::types`]:
//!
//! ```text
//! record:  obj | {"data": obj} | {"<key>": obj} | {"data": {"<key>": obj}}
//! list:    [..] | {"data": [..]} | {"items": [..]} | {"<key>": [..]}
//!          | {"data": {"items" | "<key>" | "data": [..]}}
//! ```
//!
//! Image fields are renamed (`image_url`, `thumbnail`, ... become `image`),
//! galleries are reduced to `[{url, alt}]`, and relative URLs are resolved
//! against the asset base URL.

use serde_json::{Map, Value};
use url::Url;

/// Keys that may carry a primary image, in priority order.
const IMAGE_KEYS: &[&str] = &[
    "image",
    "image_url",
    "imageUrl",
    "thumbnail",
    "thumbnail_url",
    "featured_image",
];

/// Keys that may carry an image gallery, in priority order.
const GALLERY_KEYS: &[&str] = &["images", "gallery"];

/// Keys inside an image object that may carry its URL.
const IMAGE_URL_KEYS: &[&str] = &["url", "src", "path", "original"];

/// Pagination metadata extracted from a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageMeta {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub total: Option<u64>,
    pub last_page: Option<u32>,
}

impl PageMeta {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let pick = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(as_u64));
        Self {
            page: pick(&["current_page", "page"]).and_then(|v| u32::try_from(v).ok()),
            per_page: pick(&["per_page", "limit", "page_size"])
                .and_then(|v| u32::try_from(v).ok()),
            total: pick(&["total", "total_count"]),
            last_page: pick(&["last_page", "total_pages", "pages"])
                .and_then(|v| u32::try_from(v).ok()),
        }
    }

    /// Fill fields this one lacks from `other`.
    const fn or(self, other: Self) -> Self {
        Self {
            page: if self.page.is_some() { self.page } else { other.page },
            per_page: if self.per_page.is_some() {
                self.per_page
            } else {
                other.per_page
            },
            total: if self.total.is_some() {
                self.total
            } else {
                other.total
            },
            last_page: if self.last_page.is_some() {
                self.last_page
            } else {
                other.last_page
            },
        }
    }
}

/// Read a non-negative integer that may be encoded as a number or a string.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Outcome of unwrapping a single-record response.
#[derive(Debug, PartialEq)]
pub enum Record {
    /// The record object.
    Found(Value),
    /// The envelope was present but carried `null`.
    Missing,
}

/// Unwrap a single record from any accepted envelope.
///
/// `keys` are the resource names the backend may use as a wrapper
/// (`"product"`, `"cart"`, ...).
#[must_use]
pub fn unwrap_record(value: Value, keys: &[&str]) -> Record {
    let body = match value {
        Value::Object(mut obj) if obj.contains_key("data") => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    match body {
        Value::Null => Record::Missing,
        Value::Object(mut obj) => {
            for key in keys {
                if matches!(obj.get(*key), Some(Value::Object(_))) {
                    if let Some(inner) = obj.remove(*key) {
                        return Record::Found(inner);
                    }
                }
                if matches!(obj.get(*key), Some(Value::Null)) && obj.len() == 1 {
                    return Record::Missing;
                }
            }
            Record::Found(Value::Object(obj))
        }
        other => Record::Found(other),
    }
}

/// Unwrap a list and its pagination metadata from any accepted envelope.
///
/// Returns `None` when no array can be found in the response.
#[must_use]
pub fn unwrap_list(value: Value, keys: &[&str]) -> Option<(Vec<Value>, PageMeta)> {
    match value {
        Value::Array(items) => Some((items, PageMeta::default())),
        Value::Object(mut root) => {
            let mut meta = PageMeta::from_object(&root);
            if let Some(Value::Object(m)) = root.get("meta") {
                meta = PageMeta::from_object(m).or(meta);
            }
            if let Some(Value::Object(m)) = root.get("pagination") {
                meta = PageMeta::from_object(m).or(meta);
            }

            match root.remove("data") {
                Some(Value::Array(items)) => Some((items, meta)),
                Some(Value::Object(mut data)) => {
                    meta = meta.or(PageMeta::from_object(&data));
                    take_array(&mut data, keys)
                        .or_else(|| take_array(&mut data, &["data"]))
                        .map(|items| (items, meta))
                }
                _ => take_array(&mut root, keys).map(|items| (items, meta)),
            }
        }
        _ => None,
    }
}

/// Remove the first array found under `items` or one of `keys`.
fn take_array(obj: &mut Map<String, Value>, keys: &[&str]) -> Option<Vec<Value>> {
    std::iter::once("items")
        .chain(keys.iter().copied())
        .find(|key| matches!(obj.get(*key), Some(Value::Array(_))))
        .and_then(|key| match obj.remove(key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        })
}

// =============================================================================
// Image normalization
// =============================================================================

/// Resolve a possibly-relative image reference to an absolute URL.
#[must_use]
pub fn resolve_url(raw: &str, assets: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("data:") {
        return Some(raw.to_string());
    }
    assets.join(raw).ok().map(String::from)
}

/// Build a canonical `{url, alt}` object from a string or image object.
fn image_from(value: &Value, assets: &Url, fallback_alt: &str) -> Option<Value> {
    let (raw_url, alt) = match value {
        Value::String(s) => (s.as_str(), None),
        Value::Object(obj) => {
            let url = IMAGE_URL_KEYS
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))?;
            let alt = ["alt", "alt_text", "altText"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str));
            (url, alt)
        }
        _ => return None,
    };

    let url = resolve_url(raw_url, assets)?;
    let mut image = Map::new();
    image.insert("url".into(), Value::String(url));
    image.insert(
        "alt".into(),
        Value::String(alt.unwrap_or(fallback_alt).to_string()),
    );
    Some(Value::Object(image))
}

/// Normalize the image fields of a product-like object in place.
///
/// After this runs the object has exactly `image` (object or `null`) and
/// `images` (array of objects); every alias key is removed.
pub fn normalize_images(obj: &mut Map<String, Value>, assets: &Url) {
    let name = obj
        .get("name")
        .or_else(|| obj.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let primary = IMAGE_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(|v| image_from(v, assets, &name)));

    let gallery: Vec<Value> = GALLERY_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(|v| image_from(v, assets, &name))
                .collect()
        })
        .unwrap_or_default();

    for key in IMAGE_KEYS.iter().chain(GALLERY_KEYS) {
        obj.remove(*key);
    }

    let primary = primary.or_else(|| gallery.first().cloned());
    obj.insert("image".into(), primary.unwrap_or(Value::Null));
    obj.insert("images".into(), Value::Array(gallery));
}

/// Normalize a product object (title/name aliasing plus images).
pub fn normalize_product(value: &mut Value, assets: &Url) {
    let Value::Object(obj) = value else {
        return;
    };
    alias_field(obj, "name", &["title"]);
    alias_field(obj, "price", &["sale_price", "regular_price"]);
    normalize_images(obj, assets);

    if let Some(Value::Array(variants)) = obj.get_mut("variants") {
        for variant in variants.iter_mut().filter_map(Value::as_object_mut) {
            alias_field(variant, "name", &["title"]);
        }
    }
}

/// Normalize a cart or order line in place.
///
/// Lines may embed the product as `product: {...}`; name, slug and image are
/// inherited from it when the line lacks its own.
pub fn normalize_line(value: &mut Value, assets: &Url) {
    let Value::Object(obj) = value else {
        return;
    };
    alias_field(obj, "unit_price", &["price"]);
    alias_field(obj, "line_total", &["total", "subtotal"]);
    alias_field(obj, "variant_name", &["variant_title"]);

    if let Some(mut product) = obj.remove("product") {
        normalize_product(&mut product, assets);
        if let Value::Object(product) = product {
            for (line_key, product_key) in [("name", "name"), ("slug", "slug"), ("product_id", "id")]
            {
                if is_blank(obj.get(line_key)) {
                    if let Some(v) = product.get(product_key) {
                        obj.insert(line_key.into(), v.clone());
                    }
                }
            }
            if is_blank(obj.get("unit_price")) {
                if let Some(price) = product.get("price") {
                    obj.insert("unit_price".into(), price.clone());
                }
            }
            if IMAGE_KEYS.iter().all(|k| is_blank(obj.get(*k))) {
                if let Some(image) = product.get("image") {
                    obj.insert("image".into(), image.clone());
                }
            }
        }
    }

    normalize_images(obj, assets);
    obj.remove("images");
}

/// Normalize a cart or order object in place: lift nested totals, reduce
/// coupon shapes and normalize every line.
pub fn normalize_cart(value: &mut Value, assets: &Url) {
    let Value::Object(obj) = value else {
        return;
    };

    if let Some(Value::Object(totals)) = obj.remove("totals") {
        for (key, v) in totals {
            obj.entry(key).or_insert(v);
        }
    }
    alias_field(obj, "token", &["cart_token"]);
    alias_field(obj, "discount", &["discount_total", "discount_amount"]);
    alias_field(obj, "shipping", &["shipping_total"]);
    alias_field(obj, "tax", &["tax_total"]);
    alias_field(obj, "total", &["grand_total"]);
    alias_field(obj, "items", &["lines", "line_items"]);
    alias_field(obj, "number", &["order_number"]);
    alias_field(obj, "payment_url", &["redirect_url", "checkout_url"]);

    // Coupon: a bare code string, `coupon_code`, or an object.
    let coupon = match obj.remove("coupon") {
        Some(Value::String(code)) if !code.trim().is_empty() => Some(coupon_object(&code)),
        Some(Value::Object(c)) => Some(Value::Object(c)),
        _ => obj
            .remove("coupon_code")
            .and_then(|v| v.as_str().map(coupon_object)),
    };
    obj.remove("coupon_code");
    obj.insert("coupon".into(), coupon.unwrap_or(Value::Null));

    if let Some(Value::Array(items)) = obj.get_mut("items") {
        for item in items.iter_mut() {
            normalize_line(item, assets);
        }
    }
}

fn coupon_object(code: &str) -> Value {
    let mut coupon = Map::new();
    coupon.insert("code".into(), Value::String(code.trim().to_string()));
    Value::Object(coupon)
}

/// Copy the first present alias into `canonical` when `canonical` is blank,
/// then drop the aliases.
fn alias_field(obj: &mut Map<String, Value>, canonical: &str, aliases: &[&str]) {
    if is_blank(obj.get(canonical)) {
        if let Some(v) = aliases
            .iter()
            .find_map(|a| obj.get(*a).filter(|v| !v.is_null()).cloned())
        {
            obj.insert(canonical.into(), v);
        }
    }
    for alias in aliases {
        obj.remove(*alias);
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Drop `null` object members at every depth.
///
/// The backend sends `null` for absent values; after this runs an absent
/// value is a missing key, which `#[serde(default)]` fields accept.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            obj.retain(|_, v| !v.is_null());
            obj.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}

// =============================================================================
// Error bodies
// =============================================================================

/// Extract a human-readable message from an error response body.
///
/// Looks at `message`, then `error` (string or `{message}`), then the first
/// entry of `errors` (object of field lists, or array).
#[must_use]
pub fn error_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;

    if let Some(msg) = obj.get("message").and_then(Value::as_str) {
        return Some(msg.to_string());
    }
    match obj.get("error") {
        Some(Value::String(msg)) => return Some(msg.clone()),
        Some(Value::Object(err)) => {
            if let Some(msg) = err.get("message").and_then(Value::as_str) {
                return Some(msg.to_string());
            }
        }
        _ => {}
    }
    match obj.get("errors") {
        Some(Value::Object(fields)) => fields.values().find_map(first_message),
        Some(Value::Array(items)) => items.iter().find_map(first_message),
        _ => None,
    }
}

/// Field-level messages from a validation error body (`errors: {field: [..]}`).
#[must_use]
pub fn field_errors(body: &Value) -> Vec<(String, String)> {
    body.get("errors")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(field, v)| first_message(v).map(|msg| (field.clone(), msg)))
                .collect()
        })
        .unwrap_or_default()
}

fn first_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_message),
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
