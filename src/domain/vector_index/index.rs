//! Vector index trait

use async_trait::async_trait;

use super::{VectorMatch, VectorQuery, VectorRecord};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Remote similarity-search index holding historical Q&A embeddings
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces records, returning how many were written
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, DomainError>;

    /// Nearest neighbours of the query vector, best first
    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorMatch>, DomainError>;

    /// Deletes records by id, returning how many existed
    async fn delete(&self, ids: Vec<String>) -> Result<usize, DomainError>;

    /// Fetches records by id; missing ids are skipped
    async fn fetch(&self, ids: Vec<String>) -> Result<Vec<VectorRecord>, DomainError>;

    /// Index identifier for logs
    fn index_name(&self) -> String;
}
