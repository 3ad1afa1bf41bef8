//! Session-stored visitor state.
//!
//! Read helpers treat a failing or missing session entry as absent; write
//! helpers return the session error so handlers can decide.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use larkspur_core::OrderId;

use crate::analytics::AnalyticsEvent;

/// Session keys.
pub mod keys {
    /// Opaque token identifying the visitor's backend cart.
    pub const CART_TOKEN: &str = "cart_token";

    /// Checkout wizard form state.
    pub const CHECKOUT: &str = "checkout";

    /// Queued flash messages.
    pub const FLASH: &str = "flash";

    /// Analytics events queued by handlers that redirect.
    pub const PENDING_EVENTS: &str = "analytics_events";

    /// Orders placed in this session.
    pub const PLACED_ORDERS: &str = "placed_orders";
}

/// How many placed orders are remembered per session.
const MAX_PLACED_ORDERS: usize = 5;

type SessionResult<T> = Result<T, tower_sessions::session::Error>;

// =============================================================================
// Cart token
// =============================================================================

/// The visitor's cart token, if a cart was started.
pub async fn cart_token(session: &Session) -> Option<String> {
    session
        .get::<String>(keys::CART_TOKEN)
        .await
        .ok()
        .flatten()
}

/// The visitor's cart token, creating one if needed.
///
/// # Errors
///
/// Returns an error if the new token cannot be stored.
pub async fn ensure_cart_token(session: &Session) -> SessionResult<String> {
    if let Some(token) = cart_token(session).await {
        return Ok(token);
    }
    let token = Uuid::new_v4().to_string();
    session.insert(keys::CART_TOKEN, &token).await?;
    Ok(token)
}

/// Adopt a token issued by the backend when it differs from ours.
pub async fn adopt_cart_token(session: &Session, current: &str, issued: Option<&str>) {
    let Some(issued) = issued.map(str::trim).filter(|t| !t.is_empty() && *t != current) else {
        return;
    };
    if let Err(e) = session.insert(keys::CART_TOKEN, issued).await {
        tracing::warn!(error = %e, "Failed to store rotated cart token");
    }
}

/// Forget the cart (after an order is placed).
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_cart_token(session: &Session) -> SessionResult<()> {
    session.remove::<String>(keys::CART_TOKEN).await.map(|_| ())
}

// =============================================================================
// Pending analytics events
// =============================================================================

/// Queue an event to be reported on the next rendered page.
pub async fn queue_event(session: &Session, event: AnalyticsEvent) {
    let mut events = session
        .get::<Vec<AnalyticsEvent>>(keys::PENDING_EVENTS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    events.push(event);
    if let Err(e) = session.insert(keys::PENDING_EVENTS, events).await {
        tracing::warn!(error = %e, "Failed to queue analytics event");
    }
}

/// Remove and return queued events.
pub async fn take_events(session: &Session) -> Vec<AnalyticsEvent> {
    session
        .remove::<Vec<AnalyticsEvent>>(keys::PENDING_EVENTS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

// =============================================================================
// Placed orders
// =============================================================================

/// An order placed in this session.
///
/// Keeps the cart token the order was placed with, since the backend
/// authorizes order lookups by it and the session's cart token is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub cart_token: String,
    #[serde(default)]
    pub purchase_tracked: bool,
}

async fn placed_orders(session: &Session) -> Vec<PlacedOrder> {
    session
        .get::<Vec<PlacedOrder>>(keys::PLACED_ORDERS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Remember a freshly placed order.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn remember_order(session: &Session, id: OrderId, cart_token: String) -> SessionResult<()> {
    let mut orders = placed_orders(session).await;
    orders.retain(|o| o.id != id);
    orders.push(PlacedOrder {
        id,
        cart_token,
        purchase_tracked: false,
    });
    if orders.len() > MAX_PLACED_ORDERS {
        orders.drain(..orders.len() - MAX_PLACED_ORDERS);
    }
    session.insert(keys::PLACED_ORDERS, orders).await
}

/// Look up an order placed in this session.
pub async fn placed_order(session: &Session, id: &OrderId) -> Option<PlacedOrder> {
    placed_orders(session).await.into_iter().find(|o| &o.id == id)
}

/// Record that the purchase event for `id` was reported.
pub async fn mark_purchase_tracked(session: &Session, id: &OrderId) {
    let mut orders = placed_orders(session).await;
    for order in orders.iter_mut().filter(|o| &o.id == id) {
        order.purchase_tracked = true;
    }
    if let Err(e) = session.insert(keys::PLACED_ORDERS, orders).await {
        tracing::warn!(error = %e, "Failed to record purchase tracking");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_cart_token_is_stable() {
        let session = session();
        assert!(cart_token(&session).await.is_none());
        let first = ensure_cart_token(&session).await.unwrap();
        let second = ensure_cart_token(&session).await.unwrap();
        assert_eq!(first, second);
        clear_cart_token(&session).await.unwrap();
        assert!(cart_token(&session).await.is_none());
    }

    #[tokio::test]
    async fn test_adopt_rotated_token() {
        let session = session();
        let token = ensure_cart_token(&session).await.unwrap();
        adopt_cart_token(&session, &token, Some("")).await;
        assert_eq!(cart_token(&session).await.unwrap(), token);
        adopt_cart_token(&session, &token, Some("backend-42")).await;
        assert_eq!(cart_token(&session).await.unwrap(), "backend-42");
    }

    #[tokio::test]
    async fn test_placed_orders_are_bounded() {
        let session = session();
        for n in 0..7 {
            remember_order(&session, OrderId::new(n.to_string()), format!("tok-{n}"))
                .await
                .unwrap();
        }
        assert!(placed_order(&session, &OrderId::new("0")).await.is_none());
        let last = placed_order(&session, &OrderId::new("6")).await.unwrap();
        assert_eq!(last.cart_token, "tok-6");
        assert!(!last.purchase_tracked);

        mark_purchase_tracked(&session, &OrderId::new("6")).await;
        assert!(placed_order(&session, &OrderId::new("6")).await.unwrap().purchase_tracked);
    }

    #[tokio::test]
    async fn test_events_are_drained() {
        let session = session();
        queue_event(&session, AnalyticsEvent::Search { term: "vase".into() }).await;
        assert_eq!(take_events(&session).await.len(), 1);
        assert!(take_events(&session).await.is_empty());
    }
}
