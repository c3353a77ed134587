//! Support Orchestrator
//!
//! Request orchestration for support-inquiry answering:
//! - Namespaced cache store with Redis and in-memory backends
//! - In-flight deduplication, replay and strategy selection
//! - Per-operation batch scheduling
//! - Weighted multi-layer FAQ retrieval
//! - Answer quality gate

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use crate::config::{CacheConfig, OpenAiConfig, VectorIndexBackend, VectorIndexConfig};
use domain::vector_index::VectorIndex;
use domain::DomainError;
use infrastructure::{
    cache::{CacheFactory, CacheStore},
    embedding::OpenAiEmbeddingProvider,
    llm::{HttpClient, OpenAiLanguageModel},
    operations::OperationHandlers,
    orchestrator::Orchestrator,
    quality::QualityGate,
    retrieval::RetrievalScorer,
    vector_index::{InMemoryVectorIndex, PineconeConfig, PineconeIndex},
};
use tracing::info;

/// Create the application state with every component wired from configuration
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    let orchestrator = create_orchestrator(config).await?;
    let index = build_vector_index(&config.providers.vector_index)?;
    let retrieval = RetrievalScorer::new(orchestrator.clone(), index, config.retrieval.clone())?;
    let quality = QualityGate::new(config.quality.clone())?;

    info!(
        workers_per_operation = config.batch.workers_per_operation,
        max_batch_size = config.batch.max_batch_size,
        index = %config.providers.vector_index.name,
        "Application state initialized"
    );

    Ok(AppState::new(orchestrator, retrieval, quality))
}

/// Orchestrator over the configured cache and model collaborators
pub async fn create_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let cache = build_cache_store(&config.cache).await?;
    let handlers = build_handlers(&config.providers.openai)?;

    Ok(Orchestrator::new(
        handlers,
        cache,
        config.orchestrator.clone(),
        config.batch.clone(),
    ))
}

pub async fn build_cache_store(config: &CacheConfig) -> Result<CacheStore, DomainError> {
    let backend = CacheFactory::new().create(&config.backend_config()?).await?;
    Ok(CacheStore::with_config(backend, config.store_config()))
}

/// Handlers for every operation, backed by the OpenAI-compatible clients
pub fn build_handlers(config: &OpenAiConfig) -> Result<OperationHandlers, DomainError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| DomainError::configuration("providers.openai.api_key is required"))?;

    let client = HttpClient::with_timeout("openai", Duration::from_secs(config.timeout_secs))?;

    let embeddings =
        OpenAiEmbeddingProvider::with_base_url(client.clone(), api_key.clone(), &config.base_url)
            .with_model(&config.embedding_model);
    let embeddings = match config.embedding_dimensions {
        Some(dimensions) => embeddings.with_dimensions(dimensions),
        None => embeddings,
    };

    let language_model =
        OpenAiLanguageModel::with_base_url(client, api_key, &config.chat_model, &config.base_url);

    Ok(OperationHandlers::standard(
        Arc::new(embeddings),
        Arc::new(language_model),
    ))
}

pub fn build_vector_index(config: &VectorIndexConfig) -> Result<Arc<dyn VectorIndex>, DomainError> {
    match config.backend {
        VectorIndexBackend::InMemory => {
            info!(index = %config.name, "Using in-memory vector index");
            Ok(Arc::new(InMemoryVectorIndex::new(&config.name)))
        }
        VectorIndexBackend::Pinecone => {
            let host = config.host.clone().ok_or_else(|| {
                DomainError::configuration("providers.vector_index.host is required")
            })?;
            let api_key = config.api_key.clone().ok_or_else(|| {
                DomainError::configuration("providers.vector_index.api_key is required")
            })?;

            let pinecone = PineconeConfig::new(host, api_key);
            let pinecone = match &config.namespace {
                Some(namespace) => pinecone.with_namespace(namespace.clone()),
                None => pinecone,
            };

            info!(index = %config.name, "Using Pinecone vector index");
            Ok(Arc::new(PineconeIndex::new(HttpClient::new("pinecone"), pinecone)))
        }
    }
}
