//! Orchestrated request endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::api::state::AppState;
use crate::api::types::Json;
use crate::domain::orchestration::{Request, Response, Strategy};

/// POST /v1/process
///
/// The body is always the orchestrator's [`Response`]; only the status code
/// distinguishes a rejected request from a failed one.
pub async fn process_request(
    State(state): State<AppState>,
    Json(request): Json<Request>,
) -> impl IntoResponse {
    let response = state.orchestrator.process(request).await;
    (status_for(&response), Json(response))
}

fn status_for(response: &Response) -> StatusCode {
    if response.success {
        StatusCode::OK
    } else if response.strategy_used == Strategy::Rejected {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}
