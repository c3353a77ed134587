//! Orchestration outcomes

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DomainError;

/// Structured description of what an inquiry is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    #[serde(default)]
    pub core_intent: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub primary_action: String,
    #[serde(default, alias = "keywords")]
    pub semantic_keywords: Vec<String>,
}

impl IntentAnalysis {
    pub fn new(core_intent: impl Into<String>) -> Self {
        Self {
            core_intent: core_intent.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_primary_action(mut self, action: impl Into<String>) -> Self {
        self.primary_action = action.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.semantic_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.core_intent.trim().is_empty()
            && self.category.trim().is_empty()
            && self.primary_action.trim().is_empty()
            && self.semantic_keywords.is_empty()
    }
}

/// Value produced by an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperationOutput {
    Embedding(Vec<f32>),
    Text(String),
    Intent(IntentAnalysis),
}

impl OperationOutput {
    pub fn as_embedding(&self) -> Option<&[f32]> {
        match self {
            OperationOutput::Embedding(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OperationOutput::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_intent(&self) -> Option<&IntentAnalysis> {
        match self {
            OperationOutput::Intent(i) => Some(i),
            _ => None,
        }
    }
}

/// How a request was actually served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Cache,
    Replay,
    Batch,
    Immediate,
    Skip,
    /// Rejected before any strategy was chosen
    Rejected,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Cache => "cache",
            Strategy::Replay => "replay",
            Strategy::Batch => "batch",
            Strategy::Immediate => "immediate",
            Strategy::Skip => "skip",
            Strategy::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one orchestrated request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: Uuid,
    pub success: bool,
    /// `None` on failure and for skipped requests
    pub value: Option<OperationOutput>,
    pub error: Option<String>,
    pub served_from_cache: bool,
    pub strategy_used: Strategy,
    /// Served by another identical request's call
    pub deduplicated: bool,
    #[serde(rename = "latency_ms", with = "latency_ms")]
    pub latency: Duration,
}

mod latency_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(ms.max(0.0) / 1000.0))
    }
}

impl Response {
    pub fn success(request_id: Uuid, value: OperationOutput, strategy: Strategy) -> Self {
        Self {
            request_id,
            success: true,
            value: Some(value),
            error: None,
            served_from_cache: strategy == Strategy::Cache,
            strategy_used: strategy,
            deduplicated: false,
            latency: Duration::ZERO,
        }
    }

    pub fn failure(request_id: Uuid, error: &DomainError, strategy: Strategy) -> Self {
        Self {
            request_id,
            success: false,
            value: None,
            error: Some(error.to_string()),
            served_from_cache: false,
            strategy_used: strategy,
            deduplicated: false,
            latency: Duration::ZERO,
        }
    }

    /// Successful outcome that deliberately carries no value
    pub fn skipped(request_id: Uuid) -> Self {
        Self {
            request_id,
            success: true,
            value: None,
            error: None,
            served_from_cache: false,
            strategy_used: Strategy::Skip,
            deduplicated: false,
            latency: Duration::ZERO,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.strategy_used == Strategy::Skip
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Re-addresses a shared outcome to another request
    pub fn for_request(mut self, request_id: Uuid, deduplicated: bool) -> Self {
        self.request_id = request_id;
        self.deduplicated = deduplicated;
        self
    }

    /// A recorded outcome served again to an identical later request
    pub fn replayed(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self.strategy_used = Strategy::Replay;
        self.served_from_cache = false;
        self.deduplicated = true;
        self
    }
}
