//! Domain types for the commerce API.
//!
//! These are decoded from the API's JSON *after* `normalize` has reduced the
//! many response shapes to one. Every record is owned by the backend; the
//! storefront only displays these copies and posts user actions back.

use chrono::{DateTime, Utc};
use larkspur_core::{
    Address, CartItemId, CategoryId, CurrencyCode, GatewayId, Money, OrderId, OrderNumber,
    OrderStatus, PaymentStatus, ProductId, ShippingMethodId, VariantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const fn default_true() -> bool {
    true
}

// =============================================================================
// Image Types
// =============================================================================

/// Product or cart line image with an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Absolute image URL.
    pub url: String,
    /// Alt text for accessibility.
    #[serde(default)]
    pub alt: String,
}

// =============================================================================
// Catalog Types
// =============================================================================

/// Product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    #[serde(default)]
    pub slug: String,
    pub name: String,
}

/// A purchasable variant of a product (size, colour, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub name: String,
    /// Overrides the product price when present.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub available: bool,
}

/// A product as shown on listing and detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(alias = "handle")]
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    /// Primary image, chosen during normalization.
    #[serde(default)]
    pub image: Option<Image>,
    /// Full gallery, in display order.
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default = "default_true", alias = "in_stock")]
    pub available: bool,
}

impl Product {
    /// Price in the product's currency, or `fallback` if it has none.
    #[must_use]
    pub fn price_money(&self, fallback: CurrencyCode) -> Money {
        Money::new(self.price, self.currency.unwrap_or(fallback))
    }

    /// Compare-at price, only when it is higher than the selling price.
    #[must_use]
    pub fn sale_reference_price(&self, fallback: CurrencyCode) -> Option<Money> {
        self.compare_at_price
            .filter(|compare| *compare > self.price)
            .map(|compare| Money::new(compare, self.currency.unwrap_or(fallback)))
    }

    /// Whether the product has more than one selectable variant.
    #[must_use]
    pub fn has_variants(&self) -> bool {
        self.variants.len() > 1
    }
}

/// A page of results from a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

impl<T> Page<T> {
    /// Whether a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.last_page
    }

    /// Whether an earlier page exists.
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Products per listing page when the caller does not ask for a size.
pub const DEFAULT_PER_PAGE: u32 = 12;

const MAX_PER_PAGE: u32 = 100;

/// Product listing filters, forwarded as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<ProductSort>,
    pub featured: bool,
}

impl ProductQuery {
    /// Query pairs for the `/products` endpoint. Empty filters are omitted.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("per_page", self.effective_per_page().to_string()),
        ];
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        if self.featured {
            pairs.push(("featured", "1".to_string()));
        }
        pairs
    }

    /// Page size sent to the API; zero means the listing default.
    #[must_use]
    pub const fn effective_per_page(&self) -> u32 {
        if self.per_page == 0 {
            DEFAULT_PER_PAGE
        } else if self.per_page > MAX_PER_PAGE {
            MAX_PER_PAGE
        } else {
            self.per_page
        }
    }

    /// Whether this query is a free-text search (never cached).
    #[must_use]
    pub fn is_search(&self) -> bool {
        self.search.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// Sort orders understood by the product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductSort {
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// All sorts, in the order shown in the sort dropdown.
    pub const ALL: [Self; 4] = [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Name];

    /// Wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }

    /// Dropdown label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::PriceAsc => "Price: low to high",
            Self::PriceDesc => "Price: high to low",
            Self::Name => "Name",
        }
    }

    /// Parse a wire value; unknown values yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sort| sort.as_str() == raw)
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// A coupon applied to the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// A line in the cart (or in a placed order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub line_total: Option<Decimal>,
    #[serde(default)]
    pub image: Option<Image>,
    #[serde(default)]
    pub slug: String,
}

impl CartItem {
    /// The backend's line total, or unit price times quantity if it sent none.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.line_total
            .unwrap_or_else(|| self.unit_price * Decimal::from(self.quantity))
    }
}

/// The visitor's cart, as computed by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    /// Backend-issued cart token, when the backend rotates it.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping: Option<Decimal>,
    #[serde(default)]
    pub tax: Option<Decimal>,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub coupon: Option<Coupon>,
}

impl Cart {
    /// Sum of line quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line by id.
    #[must_use]
    pub fn item(&self, id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }
}

// =============================================================================
// Checkout Types
// =============================================================================

/// A shipping option offered for the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, alias = "eta")]
    pub estimated_delivery: Option<String>,
}

/// How a payment gateway completes payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    /// Card details collected by the backend's hosted fields.
    #[default]
    Card,
    /// Bank transfer, cash on delivery and similar.
    Offline,
    /// Shopper is redirected to an external payment page after ordering.
    Redirect,
    #[serde(other)]
    Other,
}

/// A payment gateway enabled on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentGateway {
    pub id: GatewayId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub kind: GatewayKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Body posted to `/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub cart_token: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_method_id: Option<ShippingMethodId>,
    pub payment_gateway_id: GatewayId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub accepts_marketing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub number: Option<OrderNumber>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub coupon: Option<Coupon>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// External payment page for redirect gateways.
    #[serde(default)]
    pub payment_url: Option<String>,
}

impl Order {
    /// Order number for display, falling back to the id.
    #[must_use]
    pub fn display_number(&self) -> String {
        self.number
            .as_ref()
            .map_or_else(|| self.id.to_string(), ToString::to_string)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(price: &str, compare: Option<&str>) -> Product {
        Product {
            id: ProductId::new("1"),
            slug: "linen-apron".into(),
            name: "Linen Apron".into(),
            description: String::new(),
            price: price.parse().unwrap(),
            compare_at_price: compare.map(|c| c.parse().unwrap()),
            currency: None,
            image: None,
            images: Vec::new(),
            variants: Vec::new(),
            category: None,
            available: true,
        }
    }

    #[test]
    fn test_sale_reference_price_only_when_higher() {
        assert!(
            product("20", Some("25"))
                .sale_reference_price(CurrencyCode::USD)
                .is_some()
        );
        assert!(
            product("20", Some("20"))
                .sale_reference_price(CurrencyCode::USD)
                .is_none()
        );
        assert!(product("20", None).sale_reference_price(CurrencyCode::USD).is_none());
    }

    #[test]
    fn test_query_pairs_omit_empty_filters() {
        let query = ProductQuery {
            page: 0,
            per_page: 500,
            search: Some("   ".into()),
            category: Some(String::new()),
            sort: Some(ProductSort::PriceDesc),
            featured: false,
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("page", "1".to_string()),
                ("per_page", "100".to_string()),
                ("sort", "price_desc".to_string()),
            ]
        );
        assert!(!query.is_search());
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(ProductSort::parse("price_asc"), Some(ProductSort::PriceAsc));
        assert_eq!(ProductSort::parse("random"), None);
    }

    #[test]
    fn test_cart_item_total_falls_back_to_quantity_times_price() {
        let item: CartItem = serde_json::from_value(serde_json::json!({
            "id": 9, "product_id": 3, "name": "Mug", "quantity": 3, "unit_price": "4.50"
        }))
        .unwrap();
        assert_eq!(item.total(), "13.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_cart_item_count() {
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "items": [
                {"id": 1, "product_id": 1, "name": "A", "quantity": 2, "unit_price": 1},
                {"id": 2, "product_id": 2, "name": "B", "quantity": 1, "unit_price": 1}
            ],
            "total": 3
        }))
        .unwrap();
        assert_eq!(cart.item_count(), 3);
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_gateway_kind_tolerates_unknown() {
        let gateway: PaymentGateway = serde_json::from_value(serde_json::json!({
            "id": "crypto", "name": "Crypto", "kind": "blockchain"
        }))
        .unwrap();
        assert_eq!(gateway.kind, GatewayKind::Other);
        assert!(gateway.enabled);
    }

    #[test]
    fn test_order_display_number() {
        let order: Order =
            serde_json::from_value(serde_json::json!({"id": "ord_1", "number": 10023})).unwrap();
        assert_eq!(order.display_number(), "10023");
        let order: Order = serde_json::from_value(serde_json::json!({"id": 55})).unwrap();
        assert_eq!(order.display_number(), "55");
    }
}
