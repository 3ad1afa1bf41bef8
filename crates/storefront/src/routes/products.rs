//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::layout::{Layout, Page};
use super::views::{ProductCard, ProductDetail};
use crate::analytics::{AnalyticsEvent, EventItem};
use crate::commerce::{ProductQuery, ProductSort};
use crate::error::Result;
use crate::filters;
use crate::middleware::CspNonce;
use crate::state::AppState;

/// Listing query string. Every field is optional and parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub page: Option<String>,
    #[serde(alias = "search")]
    pub q: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

impl ListingParams {
    fn to_query(&self) -> ProductQuery {
        ProductQuery {
            page: self
                .page
                .as_deref()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(1)
                .max(1),
            per_page: 0,
            search: non_empty(self.q.as_deref()),
            category: non_empty(self.category.as_deref()),
            sort: self.sort.as_deref().and_then(ProductSort::parse),
            featured: false,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Listing URL for `query` at `page`, keeping the active filters.
fn listing_url(query: &ProductQuery, page: u32) -> String {
    let mut params = url::form_urlencoded::Serializer::new(String::new());
    if let Some(q) = &query.search {
        params.append_pair("q", q);
    }
    if let Some(category) = &query.category {
        params.append_pair("category", category);
    }
    if let Some(sort) = query.sort {
        params.append_pair("sort", sort.as_str());
    }
    if page > 1 {
        params.append_pair("page", &page.to_string());
    }
    let params = params.finish();
    if params.is_empty() {
        "/products".to_string()
    } else {
        format!("/products?{params}")
    }
}

/// Category filter option.
pub struct CategoryOption {
    pub slug: String,
    pub name: String,
    pub selected: bool,
}

/// Sort dropdown option.
pub struct SortOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub heading: String,
    pub products: Vec<ProductCard>,
    pub search: String,
    pub categories: Vec<CategoryOption>,
    pub sorts: Vec<SortOption>,
    pub page: u32,
    pub last_page: u32,
    pub total: u64,
    pub previous_url: Option<String>,
    pub next_url: Option<String>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductDetail,
}

/// Display the product listing with search, category filter, sort and
/// pagination.
#[instrument(skip(state, session, nonce))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Query(params): Query<ListingParams>,
) -> Result<impl IntoResponse> {
    let query = params.to_query();
    let site = state.site_config().site().await;

    let (listing, categories) = tokio::join!(
        state.commerce().list_products(&query),
        state.commerce().list_categories()
    );
    let listing = listing?;
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });

    let category_name = query.category.as_deref().and_then(|slug| {
        categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| c.name.clone())
    });
    let heading = match (&query.search, &category_name) {
        (Some(term), _) => format!("Results for \u{201c}{term}\u{201d}"),
        (None, Some(name)) => name.clone(),
        (None, None) => "All products".to_string(),
    };

    let event = match &query.search {
        Some(term) => AnalyticsEvent::Search { term: term.clone() },
        None => AnalyticsEvent::ViewItemList {
            list_name: category_name.clone().unwrap_or_else(|| "All products".to_string()),
            items: listing.items.iter().map(EventItem::from).collect(),
        },
    };

    let template = ProductsIndexTemplate {
        heading: heading.clone(),
        products: listing
            .items
            .iter()
            .map(|p| ProductCard::new(p, site.currency))
            .collect(),
        search: query.search.clone().unwrap_or_default(),
        categories: categories
            .iter()
            .map(|c| CategoryOption {
                slug: c.slug.clone(),
                name: c.name.clone(),
                selected: query.category.as_deref() == Some(c.slug.as_str()),
            })
            .collect(),
        sorts: ProductSort::ALL
            .into_iter()
            .map(|s| SortOption {
                value: s.as_str(),
                label: s.label(),
                selected: query.sort == Some(s),
            })
            .collect(),
        page: listing.page,
        last_page: listing.last_page,
        total: listing.total,
        previous_url: listing
            .has_previous()
            .then(|| listing_url(&query, listing.page - 1)),
        next_url: listing
            .has_next()
            .then(|| listing_url(&query, listing.page + 1)),
        layout: Page::new(heading, listing_url(&query, listing.page))
            .event(event)
            .layout(&state, &session, &nonce)
            .await,
    };

    Ok(template)
}

/// Display a product detail page.
#[instrument(skip(state, session, nonce), fields(slug = %slug))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    nonce: CspNonce,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    // Unknown slugs surface as `CommerceError::NotFound`, rendered as a 404.
    let product = state.commerce().get_product(&slug).await?;
    let site = state.site_config().site().await;

    let layout = Page::new(product.name.clone(), format!("/products/{slug}"))
        .event(AnalyticsEvent::ViewItem {
            item: EventItem::from(&product),
        })
        .layout(&state, &session, &nonce)
        .await;

    Ok(ProductShowTemplate {
        layout,
        product: ProductDetail::new(&product, site.currency),
    })
}
