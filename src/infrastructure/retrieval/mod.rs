//! Multi-layer retrieval over historical answers

mod composite;
mod relevance;
mod scorer;

pub use composite::{build_composite, normalize_query};
pub use relevance::{concept_relevance, key_terms, IntentMatcher};
pub use scorer::{RetrievalScorer, SearchMode};
