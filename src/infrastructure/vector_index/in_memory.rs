//! Process-local vector index with exact cosine search

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::embedding::cosine_similarity;
use crate::domain::vector_index::{VectorIndex, VectorMatch, VectorQuery, VectorRecord};
use crate::domain::DomainError;

/// Brute-force index for development and tests
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    name: String,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, DomainError> {
        if let Some(empty) = records.iter().find(|r| r.values.is_empty()) {
            return Err(DomainError::vector_index(format!(
                "Record {} has an empty vector",
                empty.id
            )));
        }

        let mut stored = self.records.write().await;
        let count = records.len();

        for record in records {
            stored.insert(record.id.clone(), record);
        }

        Ok(count)
    }

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorMatch>, DomainError> {
        let stored = self.records.read().await;

        let mut matches: Vec<VectorMatch> = stored
            .values()
            .filter(|r| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|f| f.matches(&r.metadata))
            })
            .map(|r| VectorMatch {
                id: r.id.clone(),
                score: cosine_similarity(&query.vector, &r.values),
                metadata: if query.include_metadata {
                    r.metadata.clone()
                } else {
                    HashMap::new()
                },
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(query.top_k);

        Ok(matches)
    }

    async fn delete(&self, ids: Vec<String>) -> Result<usize, DomainError> {
        let mut stored = self.records.write().await;

        Ok(ids.iter().filter(|id| stored.remove(*id).is_some()).count())
    }

    async fn fetch(&self, ids: Vec<String>) -> Result<Vec<VectorRecord>, DomainError> {
        let stored = self.records.read().await;

        Ok(ids.iter().filter_map(|id| stored.get(id).cloned()).collect())
    }

    fn index_name(&self) -> String {
        self.name.clone()
    }
}
