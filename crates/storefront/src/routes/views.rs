//! Display models for templates.
//!
//! Prices are formatted here, once, so templates only print strings.

use larkspur_core::{CurrencyCode, Money};
use rust_decimal::Decimal;

use crate::commerce::{
    Cart, CartItem, Image, Order, PaymentGateway, Product, ShippingMethod,
};

fn money(amount: Decimal, currency: CurrencyCode) -> String {
    Money::new(amount, currency).to_string()
}

/// Image display data for templates.
#[derive(Debug, Clone)]
pub struct ImageView {
    pub url: String,
    pub alt: String,
}

impl ImageView {
    fn new(image: &Image, fallback_alt: &str) -> Self {
        Self {
            url: image.url.clone(),
            alt: if image.alt.trim().is_empty() {
                fallback_alt.to_string()
            } else {
                image.alt.clone()
            },
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Product tile on listing and home pages.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub image: Option<ImageView>,
    pub available: bool,
    /// Set when the product can be added without choosing a variant.
    pub quick_add: bool,
}

impl ProductCard {
    #[must_use]
    pub fn new(product: &Product, fallback: CurrencyCode) -> Self {
        Self {
            id: product.id.to_string(),
            slug: product.slug.clone(),
            name: product.name.clone(),
            price: product.price_money(fallback).to_string(),
            compare_at_price: product
                .sale_reference_price(fallback)
                .map(|m| m.to_string()),
            image: product
                .image
                .as_ref()
                .map(|img| ImageView::new(img, &product.name)),
            available: product.available,
            quick_add: product.available && !product.has_variants(),
        }
    }
}

/// Variant option on the detail page.
#[derive(Debug, Clone)]
pub struct VariantView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub available: bool,
}

/// Product detail page data.
#[derive(Debug, Clone)]
pub struct ProductDetail {
    pub card: ProductCard,
    pub description: String,
    pub images: Vec<ImageView>,
    pub variants: Vec<VariantView>,
    pub category: Option<String>,
}

impl ProductDetail {
    #[must_use]
    pub fn new(product: &Product, fallback: CurrencyCode) -> Self {
        let currency = product.currency.unwrap_or(fallback);
        let mut images: Vec<ImageView> = product
            .images
            .iter()
            .map(|img| ImageView::new(img, &product.name))
            .collect();
        if images.is_empty()
            && let Some(primary) = &product.image
        {
            images.push(ImageView::new(primary, &product.name));
        }

        Self {
            card: ProductCard::new(product, fallback),
            description: product.description.clone(),
            images,
            variants: product
                .variants
                .iter()
                .map(|v| VariantView {
                    id: v.id.to_string(),
                    name: v.name.clone(),
                    price: money(v.price.unwrap_or(product.price), currency),
                    available: v.available,
                })
                .collect(),
            category: product.category.as_ref().map(|c| c.name.clone()),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Cart line display data.
#[derive(Debug, Clone)]
pub struct CartLineView {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub variant_name: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
    pub image: Option<ImageView>,
}

impl CartLineView {
    fn new(item: &CartItem, currency: CurrencyCode) -> Self {
        Self {
            id: item.id.to_string(),
            slug: item.slug.clone(),
            name: item.name.clone(),
            variant_name: item
                .variant_name
                .clone()
                .filter(|v| !v.trim().is_empty()),
            quantity: item.quantity,
            unit_price: money(item.unit_price, currency),
            line_total: money(item.total(), currency),
            image: item.image.as_ref().map(|img| ImageView::new(img, &item.name)),
        }
    }
}

/// Cart display data. All totals are the backend's.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: String,
    pub discount: Option<String>,
    pub shipping: Option<String>,
    pub tax: Option<String>,
    pub total: String,
    pub coupon_code: Option<String>,
    pub coupon_description: Option<String>,
    /// "Spend X more for free shipping", when a threshold is configured.
    pub free_shipping_remaining: Option<String>,
}

impl CartView {
    #[must_use]
    pub fn new(cart: &Cart, fallback: CurrencyCode, free_shipping: Option<Decimal>) -> Self {
        let currency = cart.currency.unwrap_or(fallback);
        let free_shipping_remaining = free_shipping
            .map(|threshold| threshold - cart.subtotal)
            .filter(|remaining| *remaining > Decimal::ZERO && !cart.is_empty())
            .map(|remaining| money(remaining, currency));

        Self {
            items: cart
                .items
                .iter()
                .map(|item| CartLineView::new(item, currency))
                .collect(),
            item_count: cart.item_count(),
            subtotal: money(cart.subtotal, currency),
            discount: (!cart.discount.is_zero()).then(|| money(cart.discount, currency)),
            shipping: cart.shipping.map(|s| money(s, currency)),
            tax: cart.tax.map(|t| money(t, currency)),
            total: money(cart.total, currency),
            coupon_code: cart.coupon.as_ref().map(|c| c.code.clone()),
            coupon_description: cart.coupon.as_ref().and_then(|c| c.description.clone()),
            free_shipping_remaining,
        }
    }

    /// Create an empty cart.
    #[must_use]
    pub fn empty(currency: CurrencyCode) -> Self {
        Self::new(&Cart::default(), currency, None)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// Shipping option radio button.
#[derive(Debug, Clone)]
pub struct ShippingOptionView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub estimated_delivery: Option<String>,
    pub selected: bool,
}

impl ShippingOptionView {
    #[must_use]
    pub fn new(method: &ShippingMethod, currency: CurrencyCode, selected: Option<&str>) -> Self {
        Self {
            id: method.id.to_string(),
            name: method.name.clone(),
            price: if method.price.is_zero() {
                "Free".to_string()
            } else {
                money(method.price, currency)
            },
            estimated_delivery: method.estimated_delivery.clone(),
            selected: selected == Some(method.id.as_str()),
        }
    }
}

/// Payment gateway radio button.
#[derive(Debug, Clone)]
pub struct GatewayView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub selected: bool,
}

impl GatewayView {
    #[must_use]
    pub fn new(gateway: &PaymentGateway, selected: Option<&str>) -> Self {
        Self {
            id: gateway.id.to_string(),
            name: gateway.name.clone(),
            description: gateway.description.clone(),
            selected: selected == Some(gateway.id.as_str()),
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order confirmation data.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub number: String,
    pub status: &'static str,
    pub awaiting_payment: bool,
    pub email: Option<String>,
    pub items: Vec<CartLineView>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub shipping_address: Option<String>,
    pub placed_at: Option<String>,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, fallback: CurrencyCode) -> Self {
        let currency = order.currency.unwrap_or(fallback);
        Self {
            number: order.display_number(),
            status: order.status.label(),
            awaiting_payment: order.payment_status.awaiting_payment(),
            email: order.email.clone(),
            items: order
                .items
                .iter()
                .map(|item| CartLineView::new(item, currency))
                .collect(),
            subtotal: money(order.subtotal, currency),
            discount: (!order.discount.is_zero()).then(|| money(order.discount, currency)),
            shipping: money(order.shipping, currency),
            tax: money(order.tax, currency),
            total: money(order.total, currency),
            shipping_address: order.shipping_address.as_ref().map(|a| {
                format!("{} {}, {}", a.first_name.trim(), a.last_name.trim(), a.one_line())
            }),
            placed_at: order
                .created_at
                .map(|at| at.format("%B %-d, %Y").to_string()),
        }
    }
}
