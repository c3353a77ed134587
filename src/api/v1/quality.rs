//! Answer quality endpoint

use axum::extract::State;
use validator::Validate;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, QualityCheckRequest};
use crate::domain::quality::QualityReport;

/// POST /v1/quality
///
/// A rejected answer is a normal 200 response; callers act on `verdict`.
pub async fn check_quality(
    State(state): State<AppState>,
    Json(request): Json<QualityCheckRequest>,
) -> Result<Json<QualityReport>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let report = state
        .quality
        .check(&request.query, &request.answer, &request.language);

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::api::testing::{post_json, test_state};

    #[tokio::test]
    async fn test_empty_promise_is_not_accepted() {
        let (state, _) = test_state().await;

        let (status, json) = post_json(
            state,
            "/v1/quality",
            serde_json::json!({
                "query": "How do I turn off alerts?",
                "answer": "We will guide you."
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["accepted"], false);
        assert!(
            json["issues"]
                .as_array()
                .unwrap()
                .iter()
                .any(|issue| issue == "empty_promise")
        );
    }

    #[tokio::test]
    async fn test_blank_answer_is_a_bad_request() {
        let (state, _) = test_state().await;

        let (status, _) = post_json(
            state,
            "/v1/quality",
            serde_json::json!({"query": "q", "answer": ""}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
