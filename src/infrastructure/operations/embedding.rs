use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::handler::{count_mismatch, expect_operation, OperationHandler};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::orchestration::{OperationOutput, OperationType, Payload};
use crate::domain::DomainError;

/// Embeds texts; a batch becomes one multi-input embedding call
#[derive(Debug, Clone)]
pub struct EmbeddingHandler {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingHandler {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl OperationHandler for EmbeddingHandler {
    fn operation(&self) -> OperationType {
        OperationType::Embedding
    }

    async fn execute(&self, payload: &Payload) -> Result<OperationOutput, DomainError> {
        expect_operation(OperationType::Embedding, payload)?;

        let vector = self.provider.embed(payload.text()).await?;
        Ok(OperationOutput::Embedding(vector))
    }

    async fn execute_batch(&self, payloads: &[Payload]) -> Result<Vec<OperationOutput>, DomainError> {
        let mut texts = Vec::with_capacity(payloads.len());
        for payload in payloads {
            expect_operation(OperationType::Embedding, payload)?;
            texts.push(payload.text().to_string());
        }

        debug!(
            provider = self.provider.provider_name(),
            size = texts.len(),
            "Embedding batch"
        );

        let vectors = self.provider.embed_batch(texts).await?;
        if vectors.len() != payloads.len() {
            return Err(count_mismatch(payloads.len(), vectors.len()));
        }

        Ok(vectors.into_iter().map(OperationOutput::Embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;

    #[tokio::test]
    async fn test_batch_is_one_call() {
        let provider = Arc::new(MockEmbeddingProvider::new(32));
        let handler = EmbeddingHandler::new(provider.clone());

        let outputs = handler
            .execute_batch(&[Payload::embed("one"), Payload::embed("two"), Payload::embed("three")])
            .await
            .unwrap();

        assert_eq!(outputs.len(), 3);
        assert_eq!(provider.calls(), 1);
        assert_eq!(
            outputs[1].as_embedding().unwrap(),
            provider.vector_for("two").as_slice()
        );
    }

    #[tokio::test]
    async fn test_short_response_fails_whole_batch() {
        let provider = Arc::new(MockEmbeddingProvider::new(32).with_short_response());
        let handler = EmbeddingHandler::new(provider);

        let result = handler
            .execute_batch(&[Payload::embed("one"), Payload::embed("two")])
            .await;

        assert!(matches!(result, Err(DomainError::Batch { .. })));
    }

    #[tokio::test]
    async fn test_rejects_foreign_payload() {
        let handler = EmbeddingHandler::new(Arc::new(MockEmbeddingProvider::new(8)));

        let result = handler.execute(&Payload::analyze_intent("hi")).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }
}
