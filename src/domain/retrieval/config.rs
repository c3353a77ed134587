//! Retrieval weight tables and tuning

use serde::{Deserialize, Serialize};

use super::LayerKind;
use crate::domain::DomainError;

/// Percentage share of each signal in the composite search string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub original: u32,
    pub intent: u32,
    pub keywords: u32,
    pub category: u32,
    pub action: u32,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            original: 60,
            intent: 20,
            keywords: 10,
            category: 5,
            action: 5,
        }
    }
}

impl CompositeWeights {
    pub fn percent(&self, kind: LayerKind) -> u32 {
        match kind {
            LayerKind::Original => self.original,
            LayerKind::Intent => self.intent,
            LayerKind::Keywords => self.keywords,
            LayerKind::Category => self.category,
            LayerKind::Action => self.action,
        }
    }

    /// `round(percent × scale / 100)` with halves rounded up
    pub fn repetitions(&self, kind: LayerKind, scale: u32) -> usize {
        ((self.percent(kind) * scale + 50) / 100) as usize
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let total: u32 = LayerKind::ALL.iter().map(|k| self.percent(*k)).sum();

        if total == 0 || total > 100 {
            return Err(DomainError::configuration(format!(
                "Composite weights must sum to between 1 and 100, got {}",
                total
            )));
        }
        if self.original == 0 {
            return Err(DomainError::configuration(
                "Composite weight for the original query must be positive",
            ));
        }
        Ok(())
    }
}

/// Multiplier applied to raw similarity per layer in the per-signal path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerWeights {
    pub original: f32,
    pub intent: f32,
    pub keywords: f32,
    pub category: f32,
    pub action: f32,
}

impl Default for LayerWeights {
    fn default() -> Self {
        Self {
            original: 1.0,
            intent: 0.85,
            keywords: 0.7,
            category: 0.6,
            action: 0.6,
        }
    }
}

impl LayerWeights {
    pub fn weight(&self, kind: LayerKind) -> f32 {
        match kind {
            LayerKind::Original => self.original,
            LayerKind::Intent => self.intent,
            LayerKind::Keywords => self.keywords,
            LayerKind::Category => self.category,
            LayerKind::Action => self.action,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for kind in LayerKind::ALL {
            let weight = self.weight(kind);
            if !(weight > 0.0 && weight <= 1.0) {
                return Err(DomainError::configuration(format!(
                    "Layer weight for {} must be in (0, 1], got {}",
                    kind, weight
                )));
            }
        }
        Ok(())
    }
}

/// Final re-rank blend for the per-signal path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceBlend {
    pub vector: f32,
    pub intent: f32,
    pub concept: f32,
}

impl Default for RelevanceBlend {
    fn default() -> Self {
        Self {
            vector: 0.6,
            intent: 0.25,
            concept: 0.15,
        }
    }
}

impl RelevanceBlend {
    pub fn combine(&self, adjusted: f32, intent: f32, concept: f32) -> f32 {
        (self.vector * adjusted + self.intent * intent + self.concept * concept).clamp(0.0, 1.0)
    }
}

/// Retrieval tuning, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub composite_weights: CompositeWeights,
    #[serde(default)]
    pub layer_weights: LayerWeights,
    #[serde(default)]
    pub blend: RelevanceBlend,
    /// Repetitions of a 100% signal in the composite string
    #[serde(default = "default_repetition_scale")]
    pub repetition_scale: u32,
    /// Character budget of the composite string
    #[serde(default = "default_max_composite_chars")]
    pub max_composite_chars: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Layered search stops once this many results clear the threshold; 0 disables
    #[serde(default = "default_early_termination_min")]
    pub early_termination_min: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Pairs of terms treated as near-equivalent when comparing intents
    #[serde(default = "default_synonyms")]
    pub synonyms: Vec<[String; 2]>,
}

fn default_repetition_scale() -> u32 {
    10
}

fn default_max_composite_chars() -> usize {
    2000
}

fn default_similarity_threshold() -> f32 {
    0.75
}

fn default_early_termination_min() -> usize {
    3
}

fn default_top_k() -> usize {
    5
}

fn default_synonyms() -> Vec<[String; 2]> {
    [
        ("reset", "change"),
        ("password", "passcode"),
        ("account", "profile"),
        ("billing", "payment"),
        ("cancel", "unsubscribe"),
        ("delete", "remove"),
        ("login", "sign in"),
        ("refund", "reimbursement"),
        ("error", "problem"),
        ("setup", "configure"),
    ]
    .into_iter()
    .map(|(a, b)| [a.to_string(), b.to_string()])
    .collect()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            composite_weights: CompositeWeights::default(),
            layer_weights: LayerWeights::default(),
            blend: RelevanceBlend::default(),
            repetition_scale: default_repetition_scale(),
            max_composite_chars: default_max_composite_chars(),
            similarity_threshold: default_similarity_threshold(),
            early_termination_min: default_early_termination_min(),
            top_k: default_top_k(),
            synonyms: default_synonyms(),
        }
    }
}

impl RetrievalConfig {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_early_termination_min(mut self, min: usize) -> Self {
        self.early_termination_min = min;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.composite_weights.validate()?;
        self.layer_weights.validate()?;

        if self.top_k == 0 {
            return Err(DomainError::configuration("top_k must be positive"));
        }
        if self.repetition_scale == 0 {
            return Err(DomainError::configuration("repetition_scale must be positive"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DomainError::configuration(
                "similarity_threshold must be between 0 and 1",
            ));
        }
        Ok(())
    }
}
