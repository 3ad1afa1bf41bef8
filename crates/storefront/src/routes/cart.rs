//! Cart route handlers.
//!
//! Quantity changes use HTMX for updates without full page reloads; every
//! handler also works as a plain form post, answering with a redirect.
//! The cart itself lives on the backend, keyed by the session's cart token.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use larkspur_core::{CartItemId, CurrencyCode, ProductId, VariantId};

use super::layout::{Layout, Page};
use super::views::CartView;
use super::{is_htmx, safe_return_path, toast};
use crate::analytics::{AnalyticsEvent, EventItem};
use crate::commerce::{Cart, CartItem};
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::{Flash, session};
use crate::state::AppState;

/// Event fired on the page so other elements (the count badge) refresh.
const CART_UPDATED: (&str, &str) = ("HX-Trigger", "cart-updated");

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: Option<u32>,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: String,
}

/// Coupon form data.
#[derive(Debug, Deserialize)]
pub struct CouponForm {
    #[serde(default)]
    pub code: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub error: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Display settings for cart views.
struct CartDisplay {
    currency: CurrencyCode,
    free_shipping: Option<rust_decimal::Decimal>,
}

impl CartDisplay {
    async fn load(state: &AppState) -> Self {
        let site = state.site_config().site().await;
        Self {
            currency: site.currency,
            free_shipping: site.free_shipping_threshold,
        }
    }

    fn view(&self, cart: &Cart) -> CartView {
        CartView::new(cart, self.currency, self.free_shipping)
    }
}

fn event_item(line: &CartItem, quantity: u32) -> EventItem {
    EventItem {
        quantity,
        ..EventItem::from(line)
    }
}

/// Display the cart page.
#[instrument(skip(state, session, nonce))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
) -> impl IntoResponse {
    let display = CartDisplay::load(&state).await;

    let cart = match session::cart_token(&session).await {
        Some(token) => match state.commerce().get_cart(&token).await {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch cart");
                Flash::error(e.user_message()).push(&session).await;
                Cart::default()
            }
        },
        None => Cart::default(),
    };

    let event = (!cart.is_empty()).then(|| AnalyticsEvent::ViewCart {
        items: cart.items.iter().map(EventItem::from).collect(),
        value: cart.total,
    });

    CartShowTemplate {
        layout: Page::new("Cart", "/cart")
            .maybe_event(event)
            .layout(&state, &session, &nonce)
            .await,
        cart: display.view(&cart),
        error: None,
    }
}

/// Add a product to the cart.
///
/// HTMX requests get the refreshed count badge plus a `cart-updated`
/// trigger; plain form posts are redirected to the cart. The `add_to_cart`
/// analytics event is queued for the next rendered page.
#[instrument(skip(state, session, headers, form), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let htmx = is_htmx(&headers);
    let token = session::ensure_cart_token(&session).await?;
    let product_id = ProductId::new(form.product_id.trim());
    let variant_id = form
        .variant_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(VariantId::new);
    let quantity = form.quantity.unwrap_or(1).max(1);

    let result = state
        .commerce()
        .add_to_cart(&token, &product_id, variant_id.as_ref(), quantity)
        .await;

    let cart = match result {
        Ok(cart) => cart,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to add item to cart");
            let flash = Flash::error(e.user_message());
            if htmx {
                return Ok(toast(&flash));
            }
            flash.push(&session).await;
            let back = safe_return_path(form.return_to.as_deref(), "/products");
            return Ok(Redirect::to(&back).into_response());
        }
    };
    session::adopt_cart_token(&session, &token, cart.token.as_deref()).await;
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));

    if let Some(line) = cart
        .items
        .iter()
        .find(|l| l.product_id == product_id && (variant_id.is_none() || l.variant_id == variant_id))
    {
        session::queue_event(
            &session,
            AnalyticsEvent::AddToCart {
                item: event_item(line, quantity),
            },
        )
        .await;
    }

    if htmx {
        return Ok((
            AppendHeaders([CART_UPDATED]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response());
    }

    Flash::success("Added to your cart").push(&session).await;
    Ok(Redirect::to("/cart").into_response())
}

/// Change a line's quantity. Zero removes the line.
#[instrument(skip(state, session, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Response {
    let item_id = CartItemId::new(form.item_id.trim());
    change_line(&state, &session, &headers, &item_id, form.quantity).await
}

/// Remove a line from the cart.
#[instrument(skip(state, session, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Response {
    let item_id = CartItemId::new(form.item_id.trim());
    change_line(&state, &session, &headers, &item_id, 0).await
}

/// Set a line's quantity and answer with the refreshed cart.
///
/// The cart is read first so the change can be reported as an add or
/// remove event of the difference.
async fn change_line(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    item_id: &CartItemId,
    quantity: u32,
) -> Response {
    let htmx = is_htmx(headers);
    let display = CartDisplay::load(state).await;
    let Some(token) = session::cart_token(session).await else {
        return cart_response(htmx, display.view(&Cart::default()), None, session).await;
    };

    let previous = match state.commerce().get_cart(&token).await {
        Ok(cart) => cart.item(item_id).cloned(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read cart before update");
            None
        }
    };

    let result = state
        .commerce()
        .update_cart_item(&token, item_id, quantity)
        .await;

    match result {
        Ok(cart) => {
            session::adopt_cart_token(session, &token, cart.token.as_deref()).await;
            if let Some(line) = previous {
                if quantity < line.quantity {
                    session::queue_event(
                        session,
                        AnalyticsEvent::RemoveFromCart {
                            item: event_item(&line, line.quantity - quantity),
                        },
                    )
                    .await;
                } else if quantity > line.quantity {
                    session::queue_event(
                        session,
                        AnalyticsEvent::AddToCart {
                            item: event_item(&line, quantity - line.quantity),
                        },
                    )
                    .await;
                }
            }
            cart_response(htmx, display.view(&cart), None, session).await
        }
        Err(e) => {
            tracing::warn!(error = %e, item_id = %item_id, "Failed to update cart");
            let cart = state.commerce().get_cart(&token).await.unwrap_or_default();
            cart_response(htmx, display.view(&cart), Some(e.user_message()), session).await
        }
    }
}

/// HTMX gets the items fragment; plain posts are redirected to the cart with
/// any error as a flash.
async fn cart_response(
    htmx: bool,
    cart: CartView,
    error: Option<String>,
    session: &Session,
) -> Response {
    if htmx {
        return (AppendHeaders([CART_UPDATED]), CartItemsTemplate { cart, error }).into_response();
    }
    if let Some(message) = error {
        Flash::error(message).push(session).await;
    }
    Redirect::to("/cart").into_response()
}

/// Cart count badge fragment.
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let count = match session::cart_token(&session).await {
        Some(token) => state
            .commerce()
            .get_cart(&token)
            .await
            .map(|cart| cart.item_count())
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Cart count unavailable");
                0
            }),
        None => 0,
    };

    CartCountTemplate { count }
}

/// Apply a coupon code. The backend decides whether it is valid; its
/// message is shown verbatim when it is not.
#[instrument(skip(state, session, form))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CouponForm>,
) -> Redirect {
    let code = form.code.trim();
    let flash = if code.is_empty() {
        Flash::error("Enter a coupon code")
    } else if let Some(token) = session::cart_token(&session).await {
        match state.commerce().apply_coupon(&token, code).await {
            Ok(cart) => {
                session::adopt_cart_token(&session, &token, cart.token.as_deref()).await;
                add_breadcrumb("cart", "Coupon applied", Some(&[("code", code)]));
                Flash::success(format!("Coupon {} applied", code.to_uppercase()))
            }
            Err(e) => {
                tracing::info!(error = %e, "Coupon rejected");
                Flash::error(e.user_message())
            }
        }
    } else {
        Flash::error("Your cart is empty")
    };

    flash.push(&session).await;
    Redirect::to("/cart")
}

/// Remove the applied coupon.
#[instrument(skip(state, session))]
pub async fn remove_coupon(State(state): State<AppState>, session: Session) -> Redirect {
    if let Some(token) = session::cart_token(&session).await {
        let flash = match state.commerce().remove_coupon(&token).await {
            Ok(_) => Flash::info("Coupon removed"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to remove coupon");
                Flash::error(e.user_message())
            }
        };
        flash.push(&session).await;
    }
    Redirect::to("/cart")
}
