//! Search and quality request bodies

use serde::Deserialize;
use validator::Validate;

use crate::domain::orchestration::IntentAnalysis;
use crate::infrastructure::retrieval::SearchMode;

/// POST /v1/search body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
    /// Defaults to the configured `top_k`
    #[serde(default)]
    #[validate(range(min = 1, max = 50))]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub mode: SearchMode,
    /// Precomputed intent; analysed on the fly when absent
    #[serde(default)]
    pub intent: Option<IntentAnalysis>,
}

/// POST /v1/quality body
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QualityCheckRequest {
    #[validate(length(min = 1, max = 8000))]
    pub query: String,
    #[validate(length(min = 1, max = 16000))]
    pub answer: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 2, max = 16))]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}
