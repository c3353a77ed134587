//! Domain layer - Core types, collaborator traits and errors

pub mod cache;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod orchestration;
pub mod quality;
pub mod retrieval;
pub mod vector_index;

pub use error::DomainError;
