//! Scored retrieval results

use serde::{Deserialize, Serialize};

use super::LayerKind;
use crate::domain::orchestration::IntentAnalysis;
use crate::domain::vector_index::{Metadata, VectorMatch};

/// Index hit with every score the re-rank needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub id: String,
    /// Layer whose query first surfaced this hit
    pub layer: LayerKind,
    pub raw_similarity: f32,
    /// `raw_similarity × layer_weight`
    pub adjusted_score: f32,
    pub intent_relevance: f32,
    pub concept_relevance: f32,
    /// Ranking score in [0, 1]
    pub final_score: f32,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl ScoredMatch {
    pub fn from_match(hit: VectorMatch, layer: LayerKind, weight: f32) -> Self {
        let adjusted = hit.score * weight;

        Self {
            id: hit.id,
            layer,
            raw_similarity: hit.score,
            adjusted_score: adjusted,
            intent_relevance: 0.0,
            concept_relevance: 0.0,
            final_score: adjusted.clamp(0.0, 1.0),
            metadata: hit.metadata,
        }
    }

    pub fn question(&self) -> Option<&str> {
        self.metadata.get("question").and_then(|v| v.as_str())
    }

    pub fn answer(&self) -> Option<&str> {
        self.metadata.get("answer").and_then(|v| v.as_str())
    }
}

/// Which retrieval path produced a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    /// One weighted composite query
    Composite,
    /// The bare query, after the composite attempt failed
    BareQuery,
    /// One query per signal layer
    Layered,
}

/// Search results plus how they were obtained
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub matches: Vec<ScoredMatch>,
    pub path: SearchPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentAnalysis>,
    pub served_from_cache: bool,
}

impl SearchOutcome {
    pub fn empty(path: SearchPath) -> Self {
        Self {
            matches: Vec::new(),
            path,
            intent: None,
            served_from_cache: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
