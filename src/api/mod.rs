//! API layer - HTTP endpoints and middleware

pub mod health;
pub mod middleware;
pub mod router;
pub mod state;
pub mod types;
pub mod v1;

pub use router::create_router;
pub use state::AppState;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::{create_router, AppState};
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::quality::QualityConfig;
    use crate::domain::retrieval::RetrievalConfig;
    use crate::domain::vector_index::{VectorIndex, VectorRecord};
    use crate::infrastructure::batch::BatchSchedulerConfig;
    use crate::infrastructure::cache::{CacheStore, InMemoryCache};
    use crate::infrastructure::operations::{EmbeddingHandler, OperationHandlers};
    use crate::infrastructure::orchestrator::{Orchestrator, OrchestratorConfig};
    use crate::infrastructure::quality::QualityGate;
    use crate::infrastructure::retrieval::RetrievalScorer;
    use crate::infrastructure::vector_index::InMemoryVectorIndex;

    pub const TEST_DIMENSIONS: usize = 64;

    const FAQ: [(&str, &str); 3] = [
        ("faq-password", "how do I reset my password"),
        ("faq-invoice", "where can I download my invoice"),
        ("faq-cancel", "how do I cancel my subscription"),
    ];

    /// State backed by a mock embedder and a seeded in-memory FAQ index
    pub async fn test_state() -> (AppState, Arc<MockEmbeddingProvider>) {
        let provider = Arc::new(MockEmbeddingProvider::new(TEST_DIMENSIONS));

        let orchestrator = Orchestrator::new(
            OperationHandlers::new().with_handler(Arc::new(EmbeddingHandler::new(provider.clone()))),
            CacheStore::new(Arc::new(InMemoryCache::new())),
            OrchestratorConfig::default(),
            BatchSchedulerConfig::default().with_collection_timeout(Duration::from_millis(5)),
        );

        let index = Arc::new(InMemoryVectorIndex::new("faq"));
        index
            .upsert(
                FAQ.iter()
                    .map(|(id, question)| {
                        VectorRecord::new(*id, provider.vector_for(question))
                            .with_metadata("question", *question)
                    })
                    .collect(),
            )
            .await
            .unwrap();

        let retrieval =
            RetrievalScorer::new(orchestrator.clone(), index, RetrievalConfig::default()).unwrap();
        let quality = QualityGate::new(QualityConfig::default()).unwrap();

        (AppState::new(orchestrator, retrieval, quality), provider)
    }

    /// POSTs a JSON body through the full router
    pub async fn post_json(
        state: AppState,
        uri: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = create_router(state, None)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}
