//! Storefront analytics events.
//!
//! Events are provider-neutral; each adapter maps them to its own vocabulary.
//! They are serializable so a handler that redirects can queue an event in
//! the session for the next rendered page.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commerce::{Cart, CartItem, Order, Product};

/// One product in an event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventItem {
    pub item_id: String,
    pub item_name: String,
    #[serde(default)]
    pub item_variant: Option<String>,
    #[serde(default)]
    pub item_category: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
}

impl EventItem {
    /// Line value (`price * quantity`).
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

impl From<&Product> for EventItem {
    fn from(product: &Product) -> Self {
        Self {
            item_id: product.id.to_string(),
            item_name: product.name.clone(),
            item_variant: None,
            item_category: product.category.as_ref().map(|c| c.name.clone()),
            price: product.price,
            quantity: 1,
        }
    }
}

impl From<&CartItem> for EventItem {
    fn from(item: &CartItem) -> Self {
        Self {
            item_id: item.product_id.to_string(),
            item_name: item.name.clone(),
            item_variant: item.variant_name.clone(),
            item_category: None,
            price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

/// Checkout context shared by the checkout funnel events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    pub items: Vec<EventItem>,
    pub value: Decimal,
    #[serde(default)]
    pub coupon: Option<String>,
}

impl From<&Cart> for CheckoutSnapshot {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items.iter().map(EventItem::from).collect(),
            value: cart.total,
            coupon: cart.coupon.as_ref().map(|c| c.code.clone()),
        }
    }
}

/// A tracked shopper interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    PageView {
        path: String,
        title: String,
    },
    ViewItemList {
        list_name: String,
        items: Vec<EventItem>,
    },
    ViewItem {
        item: EventItem,
    },
    AddToCart {
        item: EventItem,
    },
    RemoveFromCart {
        item: EventItem,
    },
    ViewCart {
        items: Vec<EventItem>,
        value: Decimal,
    },
    BeginCheckout {
        checkout: CheckoutSnapshot,
    },
    AddShippingInfo {
        checkout: CheckoutSnapshot,
        shipping_tier: Option<String>,
    },
    AddPaymentInfo {
        checkout: CheckoutSnapshot,
        payment_type: Option<String>,
    },
    Purchase {
        transaction_id: String,
        value: Decimal,
        tax: Decimal,
        shipping: Decimal,
        coupon: Option<String>,
        items: Vec<EventItem>,
    },
    Search {
        term: String,
    },
}

impl AnalyticsEvent {
    /// Purchase event for a placed order.
    #[must_use]
    pub fn purchase(order: &Order) -> Self {
        Self::Purchase {
            transaction_id: order.display_number(),
            value: order.total,
            tax: order.tax,
            shipping: order.shipping,
            coupon: order.coupon.as_ref().map(|c| c.code.clone()),
            items: order.items.iter().map(EventItem::from).collect(),
        }
    }
}
