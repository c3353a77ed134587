//! Search layers and plans

use std::fmt;

use serde::{Deserialize, Serialize};

use super::LayerWeights;
use crate::domain::orchestration::IntentAnalysis;
use crate::domain::DomainError;

/// Semantic signal a layer searches with, in descending default weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Original,
    Intent,
    Keywords,
    Category,
    Action,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Original,
        LayerKind::Intent,
        LayerKind::Keywords,
        LayerKind::Category,
        LayerKind::Action,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Original => "original",
            LayerKind::Intent => "intent",
            LayerKind::Keywords => "keywords",
            LayerKind::Category => "category",
            LayerKind::Action => "action",
        }
    }

    /// Text this signal contributes for a query, `None` when the signal is absent
    pub fn signal_text(&self, query: &str, intent: Option<&IntentAnalysis>) -> Option<String> {
        let text = match (self, intent) {
            (LayerKind::Original, _) => query.trim().to_string(),
            (LayerKind::Intent, Some(i)) => humanize(&i.core_intent),
            (LayerKind::Keywords, Some(i)) => i
                .semantic_keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            (LayerKind::Category, Some(i)) => humanize(&i.category),
            (LayerKind::Action, Some(i)) => humanize(&i.primary_action),
            (_, None) => String::new(),
        };

        if text.is_empty() { None } else { Some(text) }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns labels like `reset_password` into searchable text
fn humanize(label: &str) -> String {
    label
        .split(['_', '-'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One query issued against the index and the weight its hits carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchLayer {
    pub query_text: String,
    pub weight: f32,
    pub kind: LayerKind,
}

impl SearchLayer {
    pub fn new(kind: LayerKind, query_text: impl Into<String>, weight: f32) -> Result<Self, DomainError> {
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(DomainError::validation(format!(
                "Layer weight for {} must be in (0, 1], got {}",
                kind, weight
            )));
        }

        Ok(Self {
            query_text: query_text.into(),
            weight,
            kind,
        })
    }
}

/// Ordered layers for the per-signal search path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub layers: Vec<SearchLayer>,
}

impl SearchPlan {
    /// Builds one layer per present signal, highest weight first
    pub fn build(
        query: &str,
        intent: Option<&IntentAnalysis>,
        weights: &LayerWeights,
    ) -> Result<Self, DomainError> {
        let mut layers = Vec::new();

        for kind in LayerKind::ALL {
            if let Some(text) = kind.signal_text(query, intent) {
                layers.push(SearchLayer::new(kind, text, weights.weight(kind))?);
            }
        }

        // Stable, so equal weights keep signal order
        layers.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        Ok(Self { layers })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
