//! Checkout wizard route handlers.
//!
//! ```text
//! GET  /checkout              -> first incomplete step
//! GET  /checkout/{step}       -> render (guarded)
//! POST /checkout/{step}       -> validate, save, advance
//! POST /checkout/review       -> 307 to place-order
//! POST /checkout/place-order  -> validate everything, post the order
//! ```

use std::collections::HashMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use larkspur_core::{Address, CurrencyCode};

use super::layout::{Layout, Page};
use super::views::{CartView, GatewayView, ShippingOptionView};
use crate::analytics::{AnalyticsEvent, CheckoutSnapshot};
use crate::checkout::{
    CheckoutForm, CheckoutStep, FieldErrors, StepContext, first_invalid_step, guard, validate_step,
};
use crate::commerce::{
    Cart, GatewayKind, Order, PaymentGateway, ShippingMethod, encode_segment,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::{Flash, session};
use crate::state::AppState;

/// Where the review step's form posts.
const PLACE_ORDER_PATH: &str = "/checkout/place-order";

// =============================================================================
// View Types
// =============================================================================

/// Progress indicator entry.
pub struct StepLink {
    pub label: &'static str,
    pub path: String,
    pub current: bool,
    /// Earlier step; linked, since going back never validates.
    pub done: bool,
}

/// A text input with its current value and error.
pub struct InputView {
    pub name: String,
    pub label: &'static str,
    pub value: String,
    pub error: String,
    pub required: bool,
    pub autocomplete: &'static str,
}

fn address_inputs(prefix: &str, address: &Address, errors: &FieldErrors) -> Vec<InputView> {
    let billing = prefix == "billing_";
    [
        ("first_name", "First name", &address.first_name, true, "given-name"),
        ("last_name", "Last name", &address.last_name, true, "family-name"),
        ("line1", "Address", &address.line1, true, "address-line1"),
        ("line2", "Apartment, suite, etc.", &address.line2, false, "address-line2"),
        ("city", "City", &address.city, true, "address-level2"),
        ("region", "State / region", &address.region, true, "address-level1"),
        ("postal_code", "Postal code", &address.postal_code, true, "postal-code"),
        ("country_code", "Country code", &address.country_code, true, "country"),
        ("phone", "Phone", &address.phone, false, "tel"),
    ]
    .into_iter()
    .map(|(field, label, value, required, autocomplete)| {
        let name = format!("{prefix}{field}");
        InputView {
            error: errors.message(&name).to_string(),
            name,
            label,
            value: value.clone(),
            required,
            autocomplete: if billing {
                billing_autocomplete(autocomplete)
            } else {
                autocomplete
            },
        }
    })
    .collect()
}

/// Billing autofill tokens, kept apart from shipping by browsers.
fn billing_autocomplete(token: &'static str) -> &'static str {
    match token {
        "given-name" => "billing given-name",
        "family-name" => "billing family-name",
        "address-line1" => "billing address-line1",
        "address-line2" => "billing address-line2",
        "address-level2" => "billing address-level2",
        "address-level1" => "billing address-level1",
        "postal-code" => "billing postal-code",
        "country" => "billing country",
        _ => token,
    }
}

/// Checkout step page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/step.html")]
pub struct CheckoutTemplate {
    pub layout: Layout,
    pub step: &'static str,
    pub step_label: &'static str,
    pub steps: Vec<StepLink>,
    pub action: String,
    pub back_url: String,
    pub errors: FieldErrors,
    pub cart: CartView,
    pub email: String,
    pub phone: String,
    pub accepts_marketing: bool,
    pub shipping_fields: Vec<InputView>,
    pub shipping_options: Vec<ShippingOptionView>,
    pub billing_same_as_shipping: bool,
    pub billing_fields: Vec<InputView>,
    pub gateways: Vec<GatewayView>,
    pub notes: String,
    pub terms_accepted: bool,
    pub shipping_summary: String,
    pub billing_summary: String,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
}

/// Interstitial that forwards the shopper to an external payment page.
///
/// A meta refresh rather than a 303, since the CSP `form-action 'self'`
/// blocks redirects to other origins after a form post.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/redirect.html")]
pub struct PaymentRedirectTemplate {
    pub layout: Layout,
    pub payment_url: String,
    pub order_number: String,
}

// =============================================================================
// Loading
// =============================================================================

/// Backend state a checkout step needs.
struct CheckoutData {
    token: String,
    cart: Cart,
    methods: Vec<ShippingMethod>,
    gateways: Vec<PaymentGateway>,
    currency: CurrencyCode,
    free_shipping: Option<rust_decimal::Decimal>,
}

impl CheckoutData {
    /// Load the cart, and the shipping and payment options when `options`.
    ///
    /// Returns `None` (after queuing a flash) when there is nothing to check
    /// out.
    async fn load(state: &AppState, session: &Session, options: bool) -> Result<Option<Self>> {
        let Some(token) = session::cart_token(session).await else {
            Flash::info("Your cart is empty").push(session).await;
            return Ok(None);
        };

        let commerce = state.commerce();
        let (cart, methods, gateways) = if options {
            let (cart, methods, gateways) = tokio::join!(
                commerce.get_cart(&token),
                commerce.shipping_methods(&token),
                commerce.payment_gateways()
            );
            (cart?, methods?, gateways?)
        } else {
            (commerce.get_cart(&token).await?, Vec::new(), Vec::new())
        };

        if cart.is_empty() {
            Flash::info("Your cart is empty").push(session).await;
            return Ok(None);
        }

        let site = state.site_config().site().await;
        Ok(Some(Self {
            token,
            cart,
            methods,
            gateways,
            currency: site.currency,
            free_shipping: site.free_shipping_threshold,
        }))
    }

    fn context(&self) -> StepContext {
        StepContext {
            shipping_methods: self.methods.iter().map(|m| m.id.clone()).collect(),
            payment_gateways: self.gateways.iter().map(|g| g.id.clone()).collect(),
        }
    }

    fn method_name(&self, form: &CheckoutForm) -> Option<String> {
        let id = form.shipping_method_id.as_ref()?;
        self.methods
            .iter()
            .find(|m| &m.id == id)
            .map(|m| m.name.clone())
    }

    fn gateway(&self, form: &CheckoutForm) -> Option<&PaymentGateway> {
        let id = form.payment_gateway_id.as_ref()?;
        self.gateways.iter().find(|g| &g.id == id)
    }

    fn template(
        &self,
        step: CheckoutStep,
        form: &CheckoutForm,
        errors: FieldErrors,
        layout: Layout,
    ) -> CheckoutTemplate {
        let selected_method = form.shipping_method_id.as_ref().map(|id| id.as_str());
        let selected_gateway = form.payment_gateway_id.as_ref().map(|id| id.as_str());
        let billing = form.effective_billing_address();

        CheckoutTemplate {
            layout,
            step: step.slug(),
            step_label: step.label(),
            steps: CheckoutStep::ALL
                .into_iter()
                .map(|s| StepLink {
                    label: s.label(),
                    path: s.path(),
                    current: s == step,
                    done: s < step,
                })
                .collect(),
            action: if step == CheckoutStep::Review {
                PLACE_ORDER_PATH.to_string()
            } else {
                step.path()
            },
            back_url: step
                .previous()
                .map_or_else(|| "/cart".to_string(), CheckoutStep::path),
            cart: CartView::new(&self.cart, self.currency, self.free_shipping),
            email: form.email.clone(),
            phone: form.phone.clone(),
            accepts_marketing: form.accepts_marketing,
            shipping_fields: address_inputs("shipping_", &form.shipping_address, &errors),
            shipping_options: self
                .methods
                .iter()
                .map(|m| ShippingOptionView::new(m, self.currency, selected_method))
                .collect(),
            billing_same_as_shipping: form.billing_same_as_shipping,
            billing_fields: address_inputs("billing_", &form.billing_address, &errors),
            gateways: self
                .gateways
                .iter()
                .map(|g| GatewayView::new(g, selected_gateway))
                .collect(),
            notes: form.notes.clone(),
            terms_accepted: form.terms_accepted,
            shipping_summary: summary(&form.shipping_address),
            billing_summary: if form.billing_same_as_shipping {
                "Same as shipping address".to_string()
            } else {
                summary(billing)
            },
            shipping_method: self.method_name(form),
            payment_method: self.gateway(form).map(|g| g.name.clone()),
            errors,
        }
    }
}

fn summary(address: &Address) -> String {
    let name = format!("{} {}", address.first_name.trim(), address.last_name.trim());
    let name = name.trim();
    let line = address.one_line();
    match (name.is_empty(), line.is_empty()) {
        (true, _) => line,
        (false, true) => name.to_string(),
        (false, false) => format!("{name}, {line}"),
    }
}

fn redirect_to_step(step: CheckoutStep) -> Response {
    Redirect::to(&step.path()).into_response()
}

fn empty_cart_redirect() -> Response {
    Redirect::to("/cart").into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Redirect to the first step that still needs input.
#[instrument(skip(state, session))]
pub async fn index(State(state): State<AppState>, session: Session) -> Result<Response> {
    let Some(data) = CheckoutData::load(&state, &session, true).await? else {
        return Ok(empty_cart_redirect());
    };
    let form = CheckoutForm::load(&session).await;
    let step = first_invalid_step(&form, &data.context(), CheckoutStep::Review)
        .unwrap_or(CheckoutStep::Review);
    Ok(redirect_to_step(step))
}

/// Render a checkout step.
///
/// Steps past the first incomplete one redirect back to it. The first
/// visit of a checkout reports `begin_checkout`.
#[instrument(skip(state, session, nonce))]
pub async fn show_step(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Path(slug): Path<String>,
) -> Result<Response> {
    let Some(step) = CheckoutStep::from_slug(&slug) else {
        return Ok(redirect_to_step(CheckoutStep::Information));
    };
    let Some(data) =
        CheckoutData::load(&state, &session, step != CheckoutStep::Information).await?
    else {
        return Ok(empty_cart_redirect());
    };

    let mut form = CheckoutForm::load(&session).await;
    if let Err(first_invalid) = guard(step, &form, &data.context()) {
        return Ok(redirect_to_step(first_invalid));
    }

    let mut page = Page::new(format!("Checkout: {}", step.label()), step.path());
    if !form.begin_checkout_tracked {
        form.begin_checkout_tracked = true;
        form.save(&session).await?;
        page = page.event(AnalyticsEvent::BeginCheckout {
            checkout: CheckoutSnapshot::from(&data.cart),
        });
    }

    let layout = page.layout(&state, &session, &nonce).await;
    Ok(data
        .template(step, &form, FieldErrors::default(), layout)
        .into_response())
}

/// Validate and save a step, then advance to the next one.
#[instrument(skip(state, session, nonce, input))]
pub async fn submit_step(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Path(slug): Path<String>,
    Form(input): Form<HashMap<String, String>>,
) -> Result<Response> {
    let Some(step) = CheckoutStep::from_slug(&slug) else {
        return Ok(redirect_to_step(CheckoutStep::Information));
    };
    if step == CheckoutStep::Review {
        // 307 keeps the method and body, so the order still passes the
        // place-order rate limit.
        return Ok(Redirect::temporary(PLACE_ORDER_PATH).into_response());
    }
    let Some(data) = CheckoutData::load(&state, &session, step != CheckoutStep::Information).await?
    else {
        return Ok(empty_cart_redirect());
    };
    let ctx = data.context();

    let mut form = CheckoutForm::load(&session).await;
    if let Err(first_invalid) = guard(step, &form, &ctx) {
        return Ok(redirect_to_step(first_invalid));
    }
    form.apply(step, &input);
    form.save(&session).await?;

    let errors = validate_step(step, &form, &ctx);
    if !errors.is_empty() {
        tracing::debug!(step = %step, errors = errors.len(), "Checkout step invalid");
        let layout = Page::new(format!("Checkout: {}", step.label()), step.path())
            .layout(&state, &session, &nonce)
            .await;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            data.template(step, &form, errors, layout),
        )
            .into_response());
    }

    let checkout = CheckoutSnapshot::from(&data.cart);
    match step {
        CheckoutStep::Shipping => {
            session::queue_event(
                &session,
                AnalyticsEvent::AddShippingInfo {
                    checkout,
                    shipping_tier: data.method_name(&form),
                },
            )
            .await;
        }
        CheckoutStep::Payment => {
            session::queue_event(
                &session,
                AnalyticsEvent::AddPaymentInfo {
                    checkout,
                    payment_type: data.gateway(&form).map(|g| g.name.clone()),
                },
            )
            .await;
        }
        CheckoutStep::Information | CheckoutStep::Review => {}
    }

    let next = step.next().unwrap_or(CheckoutStep::Review);
    Ok(redirect_to_step(next))
}

/// Place the order.
#[instrument(skip(state, session, nonce, input))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Form(input): Form<HashMap<String, String>>,
) -> Result<Response> {
    let (state, session, nonce) = (&state, &session, &nonce);
    let Some(data) = CheckoutData::load(state, session, true).await? else {
        return Ok(empty_cart_redirect());
    };
    let ctx = data.context();

    let mut form = CheckoutForm::load(session).await;
    form.apply(CheckoutStep::Review, &input);
    form.save(session).await?;

    if let Err(first_invalid) = guard(CheckoutStep::Review, &form, &ctx) {
        Flash::error("Please complete this step before placing your order")
            .push(session)
            .await;
        return Ok(redirect_to_step(first_invalid));
    }
    let errors = validate_step(CheckoutStep::Review, &form, &ctx);
    if !errors.is_empty() {
        let layout = Page::new("Checkout: Review", CheckoutStep::Review.path())
            .layout(state, session, nonce)
            .await;
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            data.template(CheckoutStep::Review, &form, errors, layout),
        )
            .into_response());
    }

    let coupon = data.cart.coupon.as_ref().map(|c| c.code.clone());
    let request = form
        .to_order_request(&data.token, coupon)
        .ok_or_else(|| AppError::Internal("validated checkout has no gateway".to_string()))?;

    let order = match state.commerce().place_order(&request).await {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(error = %e, "Order rejected");
            Flash::error(e.user_message()).push(session).await;
            return Ok(redirect_to_step(CheckoutStep::Review));
        }
    };

    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order.id.as_str())]));
    tracing::info!(order_id = %order.id, "Order placed");

    session::remember_order(session, order.id.clone(), data.token.clone()).await?;
    CheckoutForm::clear(session).await?;
    session::clear_cart_token(session).await?;

    let redirect_gateway = data
        .gateway(&form)
        .is_some_and(|g| g.kind == GatewayKind::Redirect);
    match payment_url(&order).filter(|_| redirect_gateway) {
        Some(payment_url) => {
            let layout = Page::new("Redirecting to payment", CheckoutStep::Review.path())
                .layout(state, session, nonce)
                .await;
            Ok(PaymentRedirectTemplate {
                layout,
                payment_url,
                order_number: order.display_number(),
            }
            .into_response())
        }
        None => Ok(Redirect::to(&confirmation_path(&order)).into_response()),
    }
}

/// The order's external payment page, if it is an absolute http(s) URL.
fn payment_url(order: &Order) -> Option<String> {
    let raw = order.payment_url.as_deref()?.trim();
    let url = url::Url::parse(raw).ok()?;
    matches!(url.scheme(), "https" | "http").then(|| url.to_string())
}

fn confirmation_path(order: &Order) -> String {
    format!("/orders/{}/confirmation", encode_segment(order.id.as_str()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_inputs_carry_values_and_errors() {
        let address = Address {
            first_name: "Ada".into(),
            ..Address::default()
        };
        let form = CheckoutForm {
            shipping_address: address.clone(),
            ..CheckoutForm::default()
        };
        let ctx = StepContext::default();
        let errors = validate_step(CheckoutStep::Shipping, &form, &ctx);

        let inputs = address_inputs("shipping_", &address, &errors);
        let first = inputs.iter().find(|i| i.name == "shipping_first_name").unwrap();
        assert_eq!(first.value, "Ada");
        assert!(first.error.is_empty());
        let city = inputs.iter().find(|i| i.name == "shipping_city").unwrap();
        assert_eq!(city.error, "City is required");
        let line2 = inputs.iter().find(|i| i.name == "shipping_line2").unwrap();
        assert!(!line2.required);
    }

    #[test]
    fn test_billing_inputs_use_billing_autocomplete() {
        let inputs = address_inputs("billing_", &Address::default(), &FieldErrors::default());
        assert_eq!(inputs.first().unwrap().autocomplete, "billing given-name");
    }

    #[test]
    fn test_payment_url_requires_http() {
        let mut order: Order = serde_json::from_value(serde_json::json!({"id": "ord 1"})).unwrap();
        assert!(payment_url(&order).is_none());
        order.payment_url = Some("javascript:alert(1)".into());
        assert!(payment_url(&order).is_none());
        order.payment_url = Some("https://pay.example.com/s/abc".into());
        assert_eq!(payment_url(&order).as_deref(), Some("https://pay.example.com/s/abc"));
        assert_eq!(confirmation_path(&order), "/orders/ord%201/confirmation");
    }

    #[test]
    fn test_summary_skips_blank_parts() {
        assert_eq!(summary(&Address::default()), "");
        let address = Address {
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            city: "London".into(),
            ..Address::default()
        };
        assert_eq!(summary(&address), "Ada Byron, London");
    }
}
