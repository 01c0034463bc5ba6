//! Axum route handlers for the Pricing API.

use axum::{
    extract::{FromRequest, Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::errors::AppError;
use crate::matching::matcher::Candidate;
use crate::models::pricing::{MatchSummary, PricingRequest, PricingResult};
use crate::models::taxonomy::StandardizedJob;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MatchPreviewResponse {
    #[serde(rename = "match")]
    pub job_match: MatchSummary,
    pub shortlist: Vec<Candidate>,
}

/// `Json` body whose rejections answer with the API error envelope.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/pricing
///
/// Full pipeline: match → aggregate sources → percentiles → confidence.
/// Recency is measured against today's UTC date.
pub async fn handle_price(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PricingRequest>,
) -> Result<Json<PricingResult>, AppError> {
    let result = state
        .engine
        .price(&request, Utc::now().date_naive())
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/pricing/match
///
/// Runs only the Job Matcher. No source is queried.
pub async fn handle_match(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PricingRequest>,
) -> Result<Json<MatchPreviewResponse>, AppError> {
    let outcome = state.engine.match_job(&request).await?;
    Ok(Json(MatchPreviewResponse {
        job_match: outcome.summary(),
        shortlist: outcome.shortlist().to_vec(),
    }))
}

/// GET /api/v1/taxonomy/:code
pub async fn handle_get_taxonomy(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StandardizedJob>, AppError> {
    state
        .engine
        .reference()
        .job(&code)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no taxonomy entry '{code}'")))
}
