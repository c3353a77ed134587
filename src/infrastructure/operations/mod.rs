//! Per-operation fan-out / fan-in against the remote collaborators

mod embedding;
mod handler;
mod intent;
mod prompt;
mod text;

use std::collections::HashMap;
use std::sync::Arc;

pub use embedding::EmbeddingHandler;
pub use handler::OperationHandler;
pub use intent::IntentAnalysisHandler;
pub use text::{TranslationHandler, TypoCorrectionHandler};

#[cfg(test)]
pub use handler::mock::MockOperationHandler;

use crate::domain::embedding::EmbeddingProvider;
use crate::domain::llm::LanguageModel;
use crate::domain::orchestration::OperationType;

/// Handler registry keyed by operation type
#[derive(Debug, Clone, Default)]
pub struct OperationHandlers {
    handlers: HashMap<OperationType, Arc<dyn OperationHandler>>,
}

impl OperationHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for every operation, backed by the given collaborators
    pub fn standard(
        embeddings: Arc<dyn EmbeddingProvider>,
        language_model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self::new()
            .with_handler(Arc::new(EmbeddingHandler::new(embeddings)))
            .with_handler(Arc::new(TranslationHandler::new(language_model.clone())))
            .with_handler(Arc::new(IntentAnalysisHandler::new(language_model.clone())))
            .with_handler(Arc::new(TypoCorrectionHandler::new(language_model)))
    }

    /// Registers a handler, replacing any previous one for the same operation
    pub fn with_handler(mut self, handler: Arc<dyn OperationHandler>) -> Self {
        self.handlers.insert(handler.operation(), handler);
        self
    }

    pub fn get(&self, operation: OperationType) -> Option<Arc<dyn OperationHandler>> {
        self.handlers.get(&operation).cloned()
    }

    pub fn operations(&self) -> Vec<OperationType> {
        let mut operations: Vec<_> = self.handlers.keys().copied().collect();
        operations.sort();
        operations
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OperationType, &Arc<dyn OperationHandler>)> {
        self.handlers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::llm::MockLanguageModel;

    #[test]
    fn test_standard_registers_every_operation() {
        let handlers = OperationHandlers::standard(
            Arc::new(MockEmbeddingProvider::new(8)),
            Arc::new(MockLanguageModel::with_response("ok")),
        );

        assert_eq!(handlers.operations(), OperationType::ALL.to_vec());
        for operation in OperationType::ALL {
            assert_eq!(handlers.get(operation).unwrap().operation(), operation);
        }
    }

    #[test]
    fn test_with_handler_replaces() {
        let handlers = OperationHandlers::new()
            .with_handler(Arc::new(MockOperationHandler::new(OperationType::Embedding)))
            .with_handler(Arc::new(MockOperationHandler::new(OperationType::Embedding)));

        assert_eq!(handlers.operations(), vec![OperationType::Embedding]);
        assert!(handlers.get(OperationType::Translation).is_none());
    }
}
