//! v1 API endpoints

pub mod process;
pub mod quality;
pub mod search;

use axum::{routing::post, Router};

use super::state::AppState;

/// Create v1 API router
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/process", post(process::process_request))
        .route("/search", post(search::search))
        .route("/quality", post(quality::check_quality))
}
