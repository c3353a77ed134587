use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Remote text-completion service
#[async_trait]
pub trait LanguageModel: Send + Sync + Debug {
    /// Completes a single system + user prompt, returning the generated text
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, DomainError>;

    /// Model identifier used for logs and metrics
    fn model_name(&self) -> &str;
}
