//! Orchestrated requests and their payloads

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::cache::{CacheNamespace, ContentKeyGenerator};
use crate::domain::DomainError;

/// Default wait before a caller gives up on a request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Model operations the orchestrator can route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Embedding,
    Translation,
    IntentAnalysis,
    TypoCorrection,
}

impl OperationType {
    pub const ALL: [OperationType; 4] = [
        OperationType::Embedding,
        OperationType::Translation,
        OperationType::IntentAnalysis,
        OperationType::TypoCorrection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Embedding => "embedding",
            OperationType::Translation => "translation",
            OperationType::IntentAnalysis => "intent_analysis",
            OperationType::TypoCorrection => "typo_correction",
        }
    }

    /// Cache namespace results of this operation are stored under
    pub fn namespace(&self) -> CacheNamespace {
        match self {
            OperationType::Embedding => CacheNamespace::Embedding,
            OperationType::Translation => CacheNamespace::Translation,
            OperationType::IntentAnalysis => CacheNamespace::Intent,
            OperationType::TypoCorrection => CacheNamespace::Typo,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "embedding" | "embed" => Ok(OperationType::Embedding),
            "translation" | "translate" => Ok(OperationType::Translation),
            "intent_analysis" | "intent" => Ok(OperationType::IntentAnalysis),
            "typo_correction" | "typo" => Ok(OperationType::TypoCorrection),
            _ => Err(DomainError::validation(format!("Unknown operation: {}", s))),
        }
    }
}

/// Request urgency, 1 (highest) to 10 (lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(5);
    pub const LOWEST: Priority = Priority(10);

    pub fn new(value: u8) -> Result<Self, DomainError> {
        if !(1..=10).contains(&value) {
            return Err(DomainError::validation(format!(
                "Priority must be between 1 and 10, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// The more urgent of two priorities
    pub fn most_urgent(self, other: Priority) -> Priority {
        if other.0 < self.0 { other } else { self }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl TryFrom<u8> for Priority {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller preference for how a request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyHint {
    /// Try the cache, execute immediately on a miss
    Cache,
    /// Queue for the batch scheduler
    Batch,
    /// Call the remote service right away
    Immediate,
    /// Shed the request; only honoured for sheddable requests
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct EmbedPayload {
    #[validate(length(min = 1, max = 8000))]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct TranslatePayload {
    #[validate(length(min = 1, max = 8000))]
    pub text: String,
    #[validate(length(min = 2, max = 16))]
    pub source_language: String,
    #[validate(length(min = 2, max = 16))]
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct IntentPayload {
    #[validate(length(min = 1, max = 8000))]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct TypoPayload {
    #[validate(length(min = 1, max = 8000))]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, max = 16))]
    pub language: Option<String>,
}

/// Operation-specific input, one variant per operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Embed(EmbedPayload),
    Translate(TranslatePayload),
    AnalyzeIntent(IntentPayload),
    CorrectTypos(TypoPayload),
}

impl Payload {
    pub fn embed(text: impl Into<String>) -> Self {
        Payload::Embed(EmbedPayload { text: text.into() })
    }

    pub fn translate(
        text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Payload::Translate(TranslatePayload {
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
        })
    }

    pub fn analyze_intent(text: impl Into<String>) -> Self {
        Payload::AnalyzeIntent(IntentPayload { text: text.into() })
    }

    pub fn correct_typos(text: impl Into<String>, language: Option<String>) -> Self {
        Payload::CorrectTypos(TypoPayload {
            text: text.into(),
            language,
        })
    }

    pub fn operation(&self) -> OperationType {
        match self {
            Payload::Embed(_) => OperationType::Embedding,
            Payload::Translate(_) => OperationType::Translation,
            Payload::AnalyzeIntent(_) => OperationType::IntentAnalysis,
            Payload::CorrectTypos(_) => OperationType::TypoCorrection,
        }
    }

    /// The text the operation works on
    pub fn text(&self) -> &str {
        match self {
            Payload::Embed(p) => &p.text,
            Payload::Translate(p) => &p.text,
            Payload::AnalyzeIntent(p) => &p.text,
            Payload::CorrectTypos(p) => &p.text,
        }
    }

    /// Content the cache key is derived from; includes every field that changes the result
    pub fn cache_content(&self) -> String {
        match self {
            Payload::Embed(p) => p.text.clone(),
            Payload::AnalyzeIntent(p) => p.text.clone(),
            Payload::Translate(p) => format!(
                "{}\u{1f}{}\u{1f}{}",
                p.source_language.to_lowercase(),
                p.target_language.to_lowercase(),
                p.text
            ),
            Payload::CorrectTypos(p) => format!(
                "{}\u{1f}{}",
                p.language.as_deref().unwrap_or("").to_lowercase(),
                p.text
            ),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let result = match self {
            Payload::Embed(p) => p.validate(),
            Payload::Translate(p) => p.validate(),
            Payload::AnalyzeIntent(p) => p.validate(),
            Payload::CorrectTypos(p) => p.validate(),
        };
        result.map_err(|e| DomainError::validation(e.to_string()))?;

        if self.text().trim().is_empty() {
            return Err(DomainError::validation("text must not be blank"));
        }

        Ok(())
    }
}

/// A single orchestrated model invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub operation: OperationType,
    pub payload: Payload,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_hint: Option<StrategyHint>,
    #[serde(default = "default_timeout_ms", rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    #[serde(default)]
    pub require_fresh: bool,
    /// Non-critical signal the orchestrator may shed under repetition
    #[serde(default)]
    pub sheddable: bool,
}

fn default_timeout_ms() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

impl Request {
    pub fn new(payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: payload.operation(),
            payload,
            priority: Priority::default(),
            strategy_hint: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            require_fresh: false,
            sheddable: false,
        }
    }

    pub fn embed(text: impl Into<String>) -> Self {
        Self::new(Payload::embed(text))
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_strategy_hint(mut self, hint: StrategyHint) -> Self {
        self.strategy_hint = Some(hint);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_require_fresh(mut self, require_fresh: bool) -> Self {
        self.require_fresh = require_fresh;
        self
    }

    pub fn sheddable(mut self) -> Self {
        self.sheddable = true;
        self
    }

    /// Stable identity of (operation, payload), shared by byte-identical requests
    pub fn dedup_key(&self) -> String {
        let payload = serde_json::to_string(&self.payload).unwrap_or_default();
        ContentKeyGenerator::digest(&format!("{}\u{1f}{}", self.operation, payload))
    }

    /// Checks the payload and that it matches the declared operation
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.payload.operation() != self.operation {
            return Err(DomainError::validation(format!(
                "Payload does not match operation {}",
                self.operation
            )));
        }

        if self.timeout.is_zero() {
            return Err(DomainError::validation("timeout must be greater than zero"));
        }

        self.payload.validate()
    }
}
