//! Text-to-text operations served by the language model

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::handler::{wrong_payload, OperationHandler};
use super::prompt::{batch_tokens, numbered_list, parse_numbered};
use crate::domain::llm::LanguageModel;
use crate::domain::orchestration::{
    OperationOutput, OperationType, Payload, TranslatePayload, TypoPayload,
};
use crate::domain::DomainError;

const DEFAULT_TOKENS_PER_ITEM: u32 = 512;

const TRANSLATE_SYSTEM: &str = "You translate customer support text. \
Preserve product names, menu labels and numbers exactly. Reply with the translation only.";

const TRANSLATE_BATCH_SYSTEM: &str = "You translate customer support text. \
Each numbered item shows its source and target language in brackets. \
Reply with one line per item using the same numbering, translations only.";

const TYPO_SYSTEM: &str = "You correct spelling and typing mistakes in customer support \
messages without changing their meaning or wording otherwise. Reply with the corrected text only.";

const TYPO_BATCH_SYSTEM: &str = "You correct spelling and typing mistakes in customer support \
messages without changing their meaning or wording otherwise. \
Reply with one line per item using the same numbering, corrected text only.";

fn translate_payload(payload: &Payload) -> Result<&TranslatePayload, DomainError> {
    match payload {
        Payload::Translate(p) => Ok(p),
        other => Err(wrong_payload(OperationType::Translation, other)),
    }
}

fn typo_payload(payload: &Payload) -> Result<&TypoPayload, DomainError> {
    match payload {
        Payload::CorrectTypos(p) => Ok(p),
        other => Err(wrong_payload(OperationType::TypoCorrection, other)),
    }
}

/// Translates between language pairs; a batch becomes one numbered prompt
#[derive(Debug, Clone)]
pub struct TranslationHandler {
    model: Arc<dyn LanguageModel>,
    tokens_per_item: u32,
}

impl TranslationHandler {
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
}

#[async_trait]
impl OperationHandler for TranslationHandler {
    fn operation(&self) -> OperationType {
        OperationType::Translation
    }

    async fn execute(&self, payload: &Payload) -> Result<OperationOutput, DomainError> {
        let p = translate_payload(payload)?;

        let user = format!(
            "Translate from {} to {}:\n\n{}",
            p.source_language, p.target_language, p.text
        );
        let text = self
            .model
            .complete(TRANSLATE_SYSTEM, &user, self.tokens_per_item)
            .await?;

        Ok(OperationOutput::Text(text.trim().to_string()))
    }

    async fn execute_batch(&self, payloads: &[Payload]) -> Result<Vec<OperationOutput>, DomainError> {
        let items = payloads
            .iter()
            .map(|payload| {
                let p = translate_payload(payload)?;
                Ok(format!("[{} -> {}] {}", p.source_language, p.target_language, p.text))
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        debug!(model = self.model.model_name(), size = items.len(), "Translation batch");

        let reply = self
            .model
            .complete(
                TRANSLATE_BATCH_SYSTEM,
                &numbered_list(&items),
                batch_tokens(self.tokens_per_item, items.len()),
            )
            .await?;

        Ok(parse_numbered(&reply, payloads.len())?
            .into_iter()
            .map(OperationOutput::Text)
            .collect())
    }
}

/// Corrects typos; a batch becomes one numbered prompt
#[derive(Debug, Clone)]
pub struct TypoCorrectionHandler {
    model: Arc<dyn LanguageModel>,
    tokens_per_item: u32,
}

impl TypoCorrectionHandler {
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

    fn item(payload: &Payload) -> Result<String, DomainError> {
        let p = typo_payload(payload)?;

        Ok(match p.language {
            Some(ref language) => format!("[{}] {}", language, p.text),
            None => p.text.clone(),
        })
    }
}

#[async_trait]
impl OperationHandler for TypoCorrectionHandler {
    fn operation(&self) -> OperationType {
        OperationType::TypoCorrection
    }

    async fn execute(&self, payload: &Payload) -> Result<OperationOutput, DomainError> {
        let p = typo_payload(payload)?;

        let user = match p.language {
            Some(ref language) => format!("Language: {}\n\n{}", language, p.text),
            None => p.text.clone(),
        };
        let text = self
            .model
            .complete(TYPO_SYSTEM, &user, self.tokens_per_item)
            .await?;

        Ok(OperationOutput::Text(text.trim().to_string()))
    }

    async fn execute_batch(&self, payloads: &[Payload]) -> Result<Vec<OperationOutput>, DomainError> {
        let items = payloads
            .iter()
            .map(Self::item)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(model = self.model.model_name(), size = items.len(), "Typo correction batch");

        let reply = self
            .model
            .complete(
                TYPO_BATCH_SYSTEM,
                &numbered_list(&items),
                batch_tokens(self.tokens_per_item, items.len()),
            )
            .await?;

        Ok(parse_numbered(&reply, payloads.len())?
            .into_iter()
            .map(OperationOutput::Text)
            .collect())
    }
}
