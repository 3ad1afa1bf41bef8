//! Order confirmation route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tower_sessions::Session;
use tracing::instrument;

use larkspur_core::OrderId;

use super::layout::{Layout, Page};
use super::views::OrderView;
use crate::analytics::AnalyticsEvent;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::session;
use crate::state::AppState;

/// Order confirmation page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/confirmation.html")]
pub struct ConfirmationTemplate {
    pub layout: Layout,
    pub order: OrderView,
}

/// Display the confirmation for an order placed in this session.
///
/// The `purchase` event is reported on the first view only, so reloading
/// the page does not double-count revenue.
#[instrument(skip(state, session, nonce), fields(order_id = %id))]
pub async fn confirmation(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = OrderId::new(id);
    let placed = session::placed_order(&session, &id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Order {id}")))?;

    let order = state.commerce().get_order(&placed.cart_token, &id).await?;
    let site = state.site_config().site().await;

    let event = if placed.purchase_tracked {
        None
    } else {
        session::mark_purchase_tracked(&session, &id).await;
        Some(AnalyticsEvent::purchase(&order))
    };

    let layout = Page::new("Order confirmed", format!("/orders/{id}/confirmation"))
        .maybe_event(event)
        .layout(&state, &session, &nonce)
        .await;

    Ok(ConfirmationTemplate {
        layout,
        order: OrderView::new(&order, site.currency),
    })
}
