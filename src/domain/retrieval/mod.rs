//! Retrieval domain - search layers, weight tables and scored matches

mod config;
mod layer;
mod scored;

pub use self::config::{CompositeWeights, LayerWeights, RelevanceBlend, RetrievalConfig};
pub use layer::{LayerKind, SearchLayer, SearchPlan};
pub use scored::{ScoredMatch, SearchOutcome, SearchPath};
