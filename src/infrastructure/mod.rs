//! Infrastructure layer - Component and collaborator implementations

pub mod batch;
pub mod cache;
pub mod embedding;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod operations;
pub mod orchestrator;
pub mod quality;
pub mod retrieval;
pub mod vector_index;
