//! Retrieval search endpoint

use axum::extract::State;
use validator::Validate;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, SearchRequest};
use crate::domain::retrieval::SearchOutcome;
use crate::infrastructure::retrieval::SearchMode;

/// POST /v1/search
///
/// Uses the supplied intent when present, otherwise analyses the query first.
/// Collaborator failures degrade to fewer or no matches rather than an error.
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let retrieval = &state.retrieval;
    let top_k = request.top_k.unwrap_or(retrieval.config().top_k);

    let outcome = match (request.intent.as_ref(), request.mode) {
        (Some(intent), SearchMode::Composite) => {
            retrieval.search_composite(&request.query, Some(intent), top_k).await
        }
        (Some(intent), SearchMode::Layered) => {
            retrieval.search_layered(&request.query, Some(intent), top_k).await
        }
        (None, mode) => retrieval.search_inquiry(&request.query, top_k, mode).await,
    };

    Ok(Json(outcome))
}
