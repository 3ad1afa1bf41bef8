//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use super::layout::{Layout, Page};
use super::views::ProductCard;
use crate::analytics::{AnalyticsEvent, EventItem};
use crate::filters;
use crate::hero::HeroView;
use crate::middleware::CspNonce;
use crate::state::AppState;

/// Number of featured products shown below the hero.
const FEATURED_LIMIT: u32 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub hero: HeroView,
    pub featured: Vec<ProductCard>,
}

/// Display the home page.
///
/// The hero layout comes from the site config; a failed featured-products
/// fetch leaves that section empty instead of failing the page.
#[instrument(skip(state, session, nonce))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
) -> impl IntoResponse {
    let site = state.site_config().site().await;

    let products = state
        .commerce()
        .featured_products(FEATURED_LIMIT)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load featured products");
            Vec::new()
        });

    let event = (!products.is_empty()).then(|| AnalyticsEvent::ViewItemList {
        list_name: "Featured".to_string(),
        items: products.iter().map(EventItem::from).collect(),
    });

    let featured = products
        .iter()
        .map(|p| ProductCard::new(p, site.currency))
        .collect();
    let hero = HeroView::new(&site.hero_variant, &site.hero, &site.store_name);

    let layout = Page::new("", "/")
        .maybe_event(event)
        .layout(&state, &session, &nonce)
        .await;

    HomeTemplate {
        layout,
        hero,
        featured,
    }
}
