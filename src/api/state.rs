//! Application state shared by every handler

use std::sync::Arc;

use crate::infrastructure::orchestrator::Orchestrator;
use crate::infrastructure::quality::QualityGate;
use crate::infrastructure::retrieval::RetrievalScorer;

/// Cheap to clone; every field is a shared handle
#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub retrieval: Arc<RetrievalScorer>,
    pub quality: Arc<QualityGate>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, retrieval: RetrievalScorer, quality: QualityGate) -> Self {
        Self {
            orchestrator,
            retrieval: Arc::new(retrieval),
            quality: Arc::new(quality),
        }
    }
}
