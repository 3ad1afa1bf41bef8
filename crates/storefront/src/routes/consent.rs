//! Analytics consent route handler.

use axum::{
    Form,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{is_htmx, safe_return_path};
use crate::analytics::Consent;
use crate::error::{AppError, Result};

/// Consent banner form.
#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    pub choice: String,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Record the visitor's consent decision.
///
/// HTMX requests get an empty body (the banner swaps itself out) and, when
/// consent was granted, `HX-Refresh` so the tracking scripts load.
#[instrument(skip(session, headers, form), fields(choice = %form.choice))]
pub async fn update(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> Result<Response> {
    let consent = Consent::from_choice(&form.choice)
        .ok_or_else(|| AppError::BadRequest(format!("unknown consent choice {:?}", form.choice)))?;
    consent.store(&session).await?;
    tracing::debug!(?consent, "Consent recorded");

    if is_htmx(&headers) {
        let refresh = if consent == Consent::Granted { "true" } else { "false" };
        return Ok((AppendHeaders([("HX-Refresh", refresh)]), "").into_response());
    }

    let back = safe_return_path(form.return_to.as_deref(), "/");
    Ok(Redirect::to(&back).into_response())
}
