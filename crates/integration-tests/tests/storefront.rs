//! End-to-end tests for the storefront router against a mock commerce API.
//!
//! Run with: cargo test -p larkspur-integration-tests

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use larkspur_integration_tests::{
    TestContext, cart_json, order_json, payment_gateways_json, shipping_address_fields,
    shipping_methods_json,
};
use serde_json::json;

/// Put a line in the cart so the session holds a cart token.
async fn add_mug(ctx: &mut TestContext) {
    ctx.mock_post("/cart/add", 200, cart_json()).await;
    ctx.mock_get("/cart", 200, cart_json()).await;

    let resp = ctx
        .post_form("/cart/add", &[("product_id", "9"), ("quantity", "2")])
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/cart"));
}

/// Fill every checkout step up to review, paying with `gateway`.
async fn fill_checkout(ctx: &mut TestContext, gateway: &str) {
    add_mug(ctx).await;
    ctx.mock_get("/shipping/methods", 200, shipping_methods_json()).await;
    ctx.mock_get("/payment/gateways", 200, payment_gateways_json()).await;

    let resp = ctx
        .post_form("/checkout/information", &[("email", "ada@example.com")])
        .await;
    assert_eq!(resp.location(), Some("/checkout/shipping"));

    let mut shipping = shipping_address_fields();
    shipping.push(("shipping_method_id", "std"));
    let resp = ctx.post_form("/checkout/shipping", &shipping).await;
    assert_eq!(resp.location(), Some("/checkout/payment"));

    let resp = ctx
        .post_form(
            "/checkout/payment",
            &[("billing_same_as_shipping", "on"), ("payment_gateway_id", gateway)],
        )
        .await;
    assert_eq!(resp.location(), Some("/checkout/review"));
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let mut ctx = TestContext::new().await;

    let resp = ctx.get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");

    let resp = ctx.get("/health/ready").await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_on_pages() {
    let mut ctx = TestContext::new().await;
    let resp = ctx.get("/health").await;

    let csp = resp.header("content-security-policy").unwrap();
    assert!(csp.contains("default-src 'none'"));
    assert!(csp.contains("form-action 'self'"));
    assert!(csp.contains("'nonce-"));
    assert_eq!(resp.header("x-content-type-options"), Some("nosniff"));
    assert!(resp.header("x-request-id").is_some());
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_product_page_renders() {
    let mut ctx = TestContext::new().await;
    ctx.mock_get(
        "/products/enamel-mug",
        200,
        json!({"data": {"id": 9, "slug": "enamel-mug", "name": "Enamel Mug", "price": "14.50"}}),
    )
    .await;

    let resp = ctx.get("/products/enamel-mug").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Enamel Mug"));
    assert!(resp.body.contains("$14.50"));
    assert!(resp.body.contains("Larkspur Test Shop"));
}

#[tokio::test]
async fn test_unknown_product_is_404() {
    let mut ctx = TestContext::new().await;
    ctx.mock_get("/products/ghost", 404, json!({"message": "No query results"}))
        .await;

    let resp = ctx.get("/products/ghost").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_listing_survives_category_failure() {
    let mut ctx = TestContext::new().await;
    ctx.mock_get(
        "/products",
        200,
        json!({
            "data": [{"id": 9, "slug": "enamel-mug", "name": "Enamel Mug", "price": "14.50"}],
            "meta": {"current_page": 1, "last_page": 1, "total": 1}
        }),
    )
    .await;
    ctx.mock_get("/categories", 500, json!({"message": "boom"})).await;

    let resp = ctx.get("/products").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("/products/enamel-mug"));
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
async fn test_empty_cart_page() {
    let mut ctx = TestContext::new().await;
    let resp = ctx.get("/cart").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Your cart"));
}

#[tokio::test]
async fn test_cart_page_shows_backend_totals() {
    let mut ctx = TestContext::new().await;
    add_mug(&mut ctx).await;

    let resp = ctx.get("/cart").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Enamel Mug"));
    assert!(resp.body.contains("$29.00"));
    assert!(resp.body.contains("$2.32"));
    assert!(resp.body.contains("$31.32"));
    assert!(resp.body.contains("Added to your cart"));
}

#[tokio::test]
async fn test_htmx_add_returns_count_and_trigger() {
    let mut ctx = TestContext::new().await;
    ctx.mock_post("/cart/add", 200, cart_json()).await;

    let resp = ctx
        .post_htmx("/cart/add", &[("product_id", "9")])
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("hx-trigger"), Some("cart-updated"));
    assert!(resp.body.contains('2'));
}

#[tokio::test]
async fn test_htmx_add_failure_is_a_toast() {
    let mut ctx = TestContext::new().await;
    ctx.mock_post(
        "/cart/add",
        422,
        json!({"message": "Only 1 left in stock"}),
    )
    .await;

    let resp = ctx
        .post_htmx("/cart/add", &[("product_id", "9"), ("quantity", "3")])
        .await;
    assert_eq!(resp.header("hx-retarget"), Some("#toasts"));
    assert!(resp.body.contains("Only 1 left in stock"));
}

#[tokio::test]
async fn test_rejected_coupon_message_is_flashed() {
    let mut ctx = TestContext::new().await;
    add_mug(&mut ctx).await;
    ctx.mock_post(
        "/cart/coupon",
        422,
        json!({"message": "The coupon WELCOME is no longer valid."}),
    )
    .await;

    let resp = ctx.post_form("/cart/coupon", &[("code", "welcome")]).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/cart"));

    let resp = ctx.get("/cart").await;
    assert!(resp.body.contains("The coupon WELCOME is no longer valid."));
}

#[tokio::test]
async fn test_blank_coupon_is_rejected_without_api_call() {
    let mut ctx = TestContext::new().await;
    let resp = ctx.post_form("/cart/coupon", &[("code", "   ")]).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);

    let resp = ctx.get("/cart").await;
    assert!(resp.body.contains("Enter a coupon code"));
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_with_empty_cart_redirects_to_cart() {
    let mut ctx = TestContext::new().await;
    let resp = ctx.get("/checkout").await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/cart"));
}

#[tokio::test]
async fn test_unknown_checkout_step_redirects_to_information() {
    let mut ctx = TestContext::new().await;
    let resp = ctx.get("/checkout/somewhere").await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/checkout/information"));
}

#[tokio::test]
async fn test_checkout_information_step_validates_and_advances() {
    let mut ctx = TestContext::new().await;
    add_mug(&mut ctx).await;
    ctx.mock_get(
        "/shipping/methods",
        200,
        json!({"data": [{"id": "std", "name": "Standard", "price": "5.00"}]}),
    )
    .await;
    ctx.mock_get(
        "/payment/gateways",
        200,
        json!({"data": [{"id": "cod", "name": "Cash on delivery", "enabled": true}]}),
    )
    .await;

    // Later steps are guarded until the earlier ones are valid.
    let resp = ctx.get("/checkout/shipping").await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/checkout/information"));

    let resp = ctx.get("/checkout/information").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Enamel Mug"));

    let resp = ctx
        .post_form("/checkout/information", &[("email", "not-an-email")])
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("Enter a valid email address"));

    let resp = ctx
        .post_form("/checkout/information", &[("email", "ada@example.com")])
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/checkout/shipping"));

    let resp = ctx.get("/checkout/shipping").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Standard"));
}

#[tokio::test]
async fn test_shipping_step_requires_address_and_offered_method() {
    let mut ctx = TestContext::new().await;
    add_mug(&mut ctx).await;
    ctx.mock_get("/shipping/methods", 200, shipping_methods_json()).await;
    ctx.mock_get("/payment/gateways", 200, payment_gateways_json()).await;
    ctx.post_form("/checkout/information", &[("email", "ada@example.com")])
        .await;

    let resp = ctx
        .post_form("/checkout/shipping", &[("shipping_first_name", "Ada")])
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("City is required"));
    assert!(resp.body.contains("Choose a shipping method"));

    let mut shipping = shipping_address_fields();
    shipping.push(("shipping_method_id", "overnight"));
    let resp = ctx.post_form("/checkout/shipping", &shipping).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("Choose a shipping method"));
    assert!(!resp.body.contains("City is required"));

    // Payment stays locked until shipping is valid.
    let resp = ctx.get("/checkout/payment").await;
    assert_eq!(resp.location(), Some("/checkout/shipping"));
}

#[tokio::test]
async fn test_payment_step_requires_offered_gateway_and_billing_address() {
    let mut ctx = TestContext::new().await;
    fill_checkout(&mut ctx, "cod").await;

    let resp = ctx
        .post_form(
            "/checkout/payment",
            &[("billing_same_as_shipping", "on"), ("payment_gateway_id", "crypto")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("Choose a payment method"));

    let resp = ctx
        .post_form("/checkout/payment", &[("payment_gateway_id", "cod")])
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("Postal code is required"));

    let resp = ctx
        .post_form(
            "/checkout/payment",
            &[("billing_same_as_shipping", "on"), ("payment_gateway_id", "cod")],
        )
        .await;
    assert_eq!(resp.location(), Some("/checkout/review"));

    let resp = ctx.get("/checkout/review").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Cash on delivery"));
    assert!(resp.body.contains("Standard"));
}

#[tokio::test]
async fn test_review_submission_goes_through_place_order() {
    let mut ctx = TestContext::new().await;
    let resp = ctx
        .post_form("/checkout/review", &[("terms_accepted", "on")])
        .await;
    assert_eq!(resp.status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.location(), Some("/checkout/place-order"));
}

#[tokio::test]
async fn test_review_requires_terms() {
    let mut ctx = TestContext::new().await;
    fill_checkout(&mut ctx, "cod").await;

    let resp = ctx.post_form("/checkout/place-order", &[]).await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("Please accept the terms and conditions"));
}

#[tokio::test]
async fn test_place_order_confirms_and_clears_checkout() {
    let mut ctx = TestContext::new().await;
    fill_checkout(&mut ctx, "cod").await;
    ctx.mock_post("/orders", 201, order_json(None)).await;
    ctx.mock_get("/orders/1042", 200, order_json(None)).await;

    let resp = ctx
        .post_form("/checkout/place-order", &[("terms_accepted", "on")])
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/orders/1042/confirmation"));

    let resp = ctx.get("/orders/1042/confirmation").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("LK-1042"));
    assert!(resp.body.contains("$36.32"));

    // The cart token went with the order, so there is nothing left to check out.
    let resp = ctx.get("/checkout").await;
    assert_eq!(resp.location(), Some("/cart"));
    let resp = ctx.get("/checkout/review").await;
    assert_eq!(resp.location(), Some("/cart"));
}

#[tokio::test]
async fn test_redirect_gateway_renders_payment_interstitial() {
    let mut ctx = TestContext::new().await;
    fill_checkout(&mut ctx, "hosted").await;
    ctx.mock_post("/orders", 201, order_json(Some("https://pay.example/s/abc123")))
        .await;

    let resp = ctx
        .post_form("/checkout/place-order", &[("terms_accepted", "on")])
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("https://pay.example/s/abc123"));
    assert!(resp.body.contains("http-equiv=\"refresh\""));
    assert!(resp.body.contains("LK-1042"));
}

#[tokio::test]
async fn test_redirect_gateway_ignores_non_http_payment_url() {
    let mut ctx = TestContext::new().await;
    fill_checkout(&mut ctx, "hosted").await;
    ctx.mock_post("/orders", 201, order_json(Some("javascript:alert(1)")))
        .await;

    let resp = ctx
        .post_form("/checkout/place-order", &[("terms_accepted", "on")])
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/orders/1042/confirmation"));
}

#[tokio::test]
async fn test_rejected_order_returns_to_review_with_message() {
    let mut ctx = TestContext::new().await;
    fill_checkout(&mut ctx, "cod").await;
    ctx.mock_post(
        "/orders",
        422,
        json!({"message": "Enamel Mug is out of stock."}),
    )
    .await;

    let resp = ctx
        .post_form("/checkout/place-order", &[("terms_accepted", "on")])
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/checkout/review"));

    let resp = ctx.get("/checkout/review").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Enamel Mug is out of stock."));
}

#[tokio::test]
async fn test_purchase_is_reported_on_first_confirmation_only() {
    let mut ctx = TestContext::with_marketing(json!({
        "ga4_measurement_id": "G-LARK123",
        "consent_required": true
    }))
    .await;
    let resp = ctx.post_form("/consent", &[("choice", "granted")]).await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);

    fill_checkout(&mut ctx, "cod").await;
    ctx.mock_post("/orders", 201, order_json(None)).await;
    ctx.mock_get("/orders/1042", 200, order_json(None)).await;
    ctx.post_form("/checkout/place-order", &[("terms_accepted", "on")])
        .await;

    let first = ctx.get("/orders/1042/confirmation").await;
    assert_eq!(first.status, StatusCode::OK);
    assert!(first.body.contains("\"purchase\""));
    assert!(first.body.contains("transaction_id"));

    let second = ctx.get("/orders/1042/confirmation").await;
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.body.contains("G-LARK123"));
    assert!(!second.body.contains("transaction_id"));
}

#[tokio::test]
async fn test_confirmation_for_foreign_order_is_404() {
    let mut ctx = TestContext::new().await;
    let resp = ctx.get("/orders/1001/confirmation").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Consent
// ============================================================================

#[tokio::test]
async fn test_consent_redirects_back() {
    let mut ctx = TestContext::new().await;
    let resp = ctx
        .post_form("/consent", &[("choice", "granted"), ("return_to", "/products")])
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/products"));

    let resp = ctx
        .post_form(
            "/consent",
            &[("choice", "denied"), ("return_to", "https://evil.example")],
        )
        .await;
    assert_eq!(resp.location(), Some("/"));
}

#[tokio::test]
async fn test_unknown_consent_choice_is_bad_request() {
    let mut ctx = TestContext::new().await;
    let resp = ctx.post_form("/consent", &[("choice", "maybe")]).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Rate limits and static assets
// ============================================================================

#[tokio::test]
async fn test_order_placement_is_rate_limited_on_both_paths() {
    let mut ctx = TestContext::new().await;

    // Burst of 3, then one request every 12 seconds.
    for _ in 0..3 {
        let resp = ctx.post_form("/checkout/place-order", &[]).await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
    }
    let resp = ctx.post_form("/checkout/place-order", &[]).await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);

    // Review submissions only forward to place-order, which stays limited.
    let resp = ctx
        .post_form("/checkout/review", &[("terms_accepted", "on")])
        .await;
    assert_eq!(resp.location(), Some("/checkout/place-order"));
    let resp = ctx
        .post_form("/checkout/place-order", &[("terms_accepted", "on")])
        .await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_coupon_routes_are_rate_limited() {
    let mut ctx = TestContext::new().await;

    for _ in 0..5 {
        let resp = ctx.post_form("/cart/coupon", &[("code", " ")]).await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
    }
    let resp = ctx.post_form("/cart/coupon", &[("code", "WELCOME")]).await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    let resp = ctx.post_form("/cart/coupon/remove", &[]).await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);

    // Other cart routes are not affected.
    let resp = ctx.get("/cart").await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn test_static_assets_skip_config_lookups() {
    let mut ctx = TestContext::new().await;

    let resp = ctx.get("/static/css/main.css").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.header("content-security-policy").is_some());

    let paths = ctx.api_paths().await;
    assert!(!paths.iter().any(|p| p.starts_with("/api/config")));
}
