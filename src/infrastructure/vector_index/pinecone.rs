//! Pinecone-compatible hosted vector index

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::vector_index::{Metadata, VectorIndex, VectorMatch, VectorQuery, VectorRecord};
use crate::domain::DomainError;
use crate::infrastructure::llm::HttpClientTrait;

/// Vectors per upsert request accepted by the hosted API
const UPSERT_CHUNK: usize = 100;

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    /// Index host, e.g. `https://support-abc123.svc.us-east1-gcp.pinecone.io`
    pub host: String,
    pub api_key: String,
    pub namespace: Option<String>,
}

impl PineconeConfig {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

#[derive(Debug)]
pub struct PineconeIndex<C: HttpClientTrait> {
    client: C,
    config: PineconeConfig,
}

impl<C: HttpClientTrait> PineconeIndex<C> {
    pub fn new(client: C, config: PineconeConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host, path)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Api-Key", self.config.api_key.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn with_namespace(&self, mut body: serde_json::Value) -> serde_json::Value {
        if let Some(ref ns) = self.config.namespace {
            body["namespace"] = serde_json::json!(ns);
        }
        body
    }

    fn fetch_url(&self, ids: &[String]) -> Result<String, DomainError> {
        let mut url = reqwest::Url::parse(&self.url("/vectors/fetch"))
            .map_err(|e| DomainError::configuration(format!("Invalid index host: {}", e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            for id in ids {
                pairs.append_pair("ids", id);
            }
            if let Some(ref ns) = self.config.namespace {
                pairs.append_pair("namespace", ns);
            }
        }

        Ok(url.to_string())
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, DomainError> {
        self.client
            .post_json(&self.url(path), self.headers(), &self.with_namespace(body))
            .await
            .map_err(into_index_error)
    }
}

/// Provider failures surface as index errors so callers can tell the collaborators apart
fn into_index_error(error: DomainError) -> DomainError {
    match error {
        DomainError::Provider { message, .. } => DomainError::vector_index(message),
        other => other,
    }
}

fn parse<T: for<'de> Deserialize<'de>>(json: serde_json::Value, what: &str) -> Result<T, DomainError> {
    serde_json::from_value(json)
        .map_err(|e| DomainError::vector_index(format!("Failed to parse {} response: {}", what, e)))
}

#[async_trait]
impl<C: HttpClientTrait> VectorIndex for PineconeIndex<C> {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, DomainError> {
        let mut upserted = 0usize;

        for chunk in records.chunks(UPSERT_CHUNK) {
            let vectors: Vec<serde_json::Value> = chunk
                .iter()
                .map(|r| serde_json::json!({"id": r.id, "values": r.values, "metadata": r.metadata}))
                .collect();

            let response: UpsertResponse =
                parse(self.post("/vectors/upsert", serde_json::json!({"vectors": vectors})).await?, "upsert")?;
            upserted += response.upserted_count;
        }

        debug!(count = upserted, "Upserted vectors");
        Ok(upserted)
    }

    async fn query(&self, query: VectorQuery) -> Result<Vec<VectorMatch>, DomainError> {
        let mut body = serde_json::json!({
            "vector": query.vector,
            "topK": query.top_k,
            "includeMetadata": query.include_metadata,
            "includeValues": false,
        });

        if let Some(ref filter) = query.filter {
            body["filter"] = filter.to_query_json();
        }

        let response: QueryResponse = parse(self.post("/query", body).await?, "query")?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete(&self, ids: Vec<String>) -> Result<usize, DomainError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let count = ids.len();
        self.post("/vectors/delete", serde_json::json!({"ids": ids})).await?;

        // The API does not report how many ids existed
        Ok(count)
    }

    async fn fetch(&self, ids: Vec<String>) -> Result<Vec<VectorRecord>, DomainError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.fetch_url(&ids)?;
        let json = self
            .client
            .get_json(&url, self.headers())
            .await
            .map_err(into_index_error)?;
        let mut response: FetchResponse = parse(json, "fetch")?;

        Ok(ids
            .iter()
            .filter_map(|id| response.vectors.remove(id))
            .map(|v| VectorRecord {
                id: v.id,
                values: v.values,
                metadata: v.metadata.unwrap_or_default(),
            })
            .collect())
    }

    fn index_name(&self) -> String {
        self.config.host.clone()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    score: f32,
    metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, FetchedVector>,
}

#[derive(Debug, Deserialize)]
struct FetchedVector {
    id: String,
    #[serde(default)]
    values: Vec<f32>,
    metadata: Option<Metadata>,
}
