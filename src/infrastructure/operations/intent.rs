//! Intent analysis via the language model

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::handler::{count_mismatch, expect_operation, OperationHandler};
use super::prompt::{batch_tokens, extract_json, numbered_list};
use crate::domain::llm::LanguageModel;
use crate::domain::orchestration::{IntentAnalysis, OperationOutput, OperationType, Payload};
use crate::domain::DomainError;

const DEFAULT_TOKENS_PER_ITEM: u32 = 300;

const INTENT_SYSTEM: &str = r#"You analyse customer support inquiries.
Describe the inquiry as a JSON object with these fields:
- "core_intent": what the customer wants, in a few words (snake_case)
- "category": the product area, e.g. account, billing, reading_plan, audio, settings
- "primary_action": the action the customer is trying to perform (snake_case)
- "semantic_keywords": up to 6 short keywords
Reply with JSON only."#;

const INTENT_BATCH_SUFFIX: &str = "\nYou will receive several numbered inquiries. \
Reply with a JSON array holding one object per inquiry, in the same order.";

/// Extracts a structured [`IntentAnalysis`] from inquiry text
#[derive(Debug, Clone)]
pub struct IntentAnalysisHandler {
    model: Arc<dyn LanguageModel>,
    tokens_per_item: u32,
}

impl IntentAnalysisHandler {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            tokens_per_item: DEFAULT_TOKENS_PER_ITEM,
        }
    }

    pub fn with_tokens_per_item(mut self, tokens: u32) -> Self {
        self.tokens_per_item = tokens;
        self
    }

    fn parse_one(reply: &str) -> Result<IntentAnalysis, DomainError> {
        let json = extract_json(reply, '{', '}').unwrap_or(reply);

        serde_json::from_str(json).map_err(|e| {
            warn!(error = %e, reply, "Unparseable intent analysis");
            DomainError::provider("intent", format!("Invalid intent analysis format: {}", e))
        })
    }

    fn parse_many(reply: &str, expected: usize) -> Result<Vec<IntentAnalysis>, DomainError> {
        let json = extract_json(reply, '[', ']').unwrap_or(reply);

        let analyses: Vec<IntentAnalysis> = serde_json::from_str(json).map_err(|e| {
            warn!(error = %e, "Unparseable intent analysis batch");
            DomainError::batch(format!("Invalid intent analysis batch format: {}", e))
        })?;

        if analyses.len() != expected {
            return Err(count_mismatch(expected, analyses.len()));
        }
        Ok(analyses)
    }
}

#[async_trait]
impl OperationHandler for IntentAnalysisHandler {
    fn operation(&self) -> OperationType {
        OperationType::IntentAnalysis
    }

    async fn execute(&self, payload: &Payload) -> Result<OperationOutput, DomainError> {
        expect_operation(OperationType::IntentAnalysis, payload)?;

        let reply = self
            .model
            .complete(INTENT_SYSTEM, payload.text(), self.tokens_per_item)
            .await?;

        Ok(OperationOutput::Intent(Self::parse_one(&reply)?))
    }

    async fn execute_batch(&self, payloads: &[Payload]) -> Result<Vec<OperationOutput>, DomainError> {
        for payload in payloads {
            expect_operation(OperationType::IntentAnalysis, payload)?;
        }

        debug!(model = self.model.model_name(), size = payloads.len(), "Intent analysis batch");

        let system = format!("{}{}", INTENT_SYSTEM, INTENT_BATCH_SUFFIX);
        let reply = self
            .model
            .complete(
                &system,
                &numbered_list(payloads.iter().map(Payload::text)),
                batch_tokens(self.tokens_per_item, payloads.len()),
            )
            .await?;

        Ok(Self::parse_many(&reply, payloads.len())?
            .into_iter()
            .map(OperationOutput::Intent)
            .collect())
    }
}
