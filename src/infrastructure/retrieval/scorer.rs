//! Historical answer retrieval over the vector index

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::composite::{build_composite, normalize_query};
use super::relevance::{concept_relevance, key_terms, IntentMatcher};
use crate::domain::cache::CacheNamespace;
use crate::domain::orchestration::{IntentAnalysis, Priority};
use crate::domain::retrieval::{
    LayerKind, RetrievalConfig, ScoredMatch, SearchOutcome, SearchPath, SearchPlan,
};
use crate::domain::vector_index::{VectorIndex, VectorMatch, VectorQuery};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_search;
use crate::infrastructure::orchestrator::Orchestrator;

/// Which retrieval path a search should take
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// One embed call for a weighted composite string
    #[default]
    Composite,
    /// One embed call per signal layer, re-ranked afterwards
    Layered,
}

/// Finds historical Q&A pairs similar to an inquiry
#[derive(Clone)]
pub struct RetrievalScorer {
    orchestrator: Orchestrator,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
    matcher: IntentMatcher,
    priority: Priority,
}

impl fmt::Debug for RetrievalScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalScorer")
            .field("index", &self.index.index_name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetrievalScorer {
    pub fn new(
        orchestrator: Orchestrator,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Result<Self, DomainError> {
        config.validate()?;

        Ok(Self {
            orchestrator,
            index,
            matcher: IntentMatcher::new(&config.synonyms),
            config,
            priority: Priority::HIGHEST,
        })
    }

    /// Priority of the embedding requests issued while searching
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Analyses the inquiry's intent, then searches with whatever signals are available
    pub async fn search_inquiry(&self, query: &str, top_k: usize, mode: SearchMode) -> SearchOutcome {
        let intent = self.orchestrator.analyze_intent(query).await;
        if intent.is_none() {
            debug!("No intent available, searching with the query alone");
        }

        match mode {
            SearchMode::Composite => self.search_composite(query, intent.as_ref(), top_k).await,
            SearchMode::Layered => self.search_layered(query, intent.as_ref(), top_k).await,
        }
    }

    /// Single-query search with a weighted composite string.
    ///
    /// Falls back to the bare query when the composite attempt fails and
    /// returns an empty set when that fails too.
    pub async fn search_composite(
        &self,
        query: &str,
        intent: Option<&IntentAnalysis>,
        top_k: usize,
    ) -> SearchOutcome {
        let started = Instant::now();
        let top_k = top_k.max(1);
        let composite = build_composite(query, intent, &self.config);

        let mut outcome = match self.composite_query(&composite, top_k, SearchPath::Composite).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Composite search failed, retrying with the bare query");
                let bare = normalize_query(query);

                match self.composite_query(&bare, top_k, SearchPath::BareQuery).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(error = %e, "Bare query search failed, returning no results");
                        SearchOutcome::empty(SearchPath::BareQuery)
                    }
                }
            }
        };

        outcome.intent = intent.cloned();
        record_search(path_label(outcome.path), outcome.matches.len(), started.elapsed());
        outcome
    }

    async fn composite_query(
        &self,
        text: &str,
        top_k: usize,
        path: SearchPath,
    ) -> Result<SearchOutcome, DomainError> {
        if text.is_empty() {
            return Err(DomainError::validation("search text is empty"));
        }

        let cache_content = format!("{}\u{1f}{}", top_k, text);
        let cache = self.orchestrator.cache();

        if let Some(matches) = cache
            .get::<Vec<ScoredMatch>>(CacheNamespace::Search, &cache_content)
            .await
        {
            return Ok(SearchOutcome {
                matches,
                path,
                intent: None,
                served_from_cache: true,
            });
        }

        let hits = self.query_index(text, top_k * 2).await?;

        let mut seen = HashSet::new();
        let mut matches: Vec<ScoredMatch> = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.id.clone()))
            .map(|hit| ScoredMatch::from_match(hit, LayerKind::Original, 1.0))
            .collect();
        matches.sort_by(|a, b| b.final_score.total_cmp(&a.final_score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k);

        if !matches.is_empty() {
            cache.set(CacheNamespace::Search, &cache_content, &matches, None).await;
        }

        Ok(SearchOutcome {
            matches,
            path,
            intent: None,
            served_from_cache: false,
        })
    }

    async fn query_index(&self, text: &str, top_k: usize) -> Result<Vec<VectorMatch>, DomainError> {
        let vector = self.orchestrator.embed(text, self.priority).await?;
        self.index.query(VectorQuery::new(vector, top_k)).await
    }

    /// One query per signal layer, merged and re-ranked.
    ///
    /// A failing layer is skipped; the remaining layers still contribute.
    pub async fn search_layered(
        &self,
        query: &str,
        intent: Option<&IntentAnalysis>,
        top_k: usize,
    ) -> SearchOutcome {
        let started = Instant::now();
        let top_k = top_k.max(1);

        let plan = match SearchPlan::build(&normalize_query(query), intent, &self.config.layer_weights) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "Could not build search plan");
                return SearchOutcome::empty(SearchPath::Layered);
            }
        };

        let mut seen = HashSet::new();
        let mut matches: Vec<ScoredMatch> = Vec::new();

        for layer in &plan.layers {
            let hits = match self.query_index(&layer.query_text, top_k).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(layer = %layer.kind, error = %e, "Search layer failed");
                    continue;
                }
            };

            matches.extend(
                hits.into_iter()
                    .filter(|hit| seen.insert(hit.id.clone()))
                    .map(|hit| ScoredMatch::from_match(hit, layer.kind, layer.weight)),
            );

            if self.should_stop(&matches) {
                debug!(layer = %layer.kind, results = matches.len(), "Early termination");
                break;
            }
        }

        self.rerank(&mut matches, query, intent);
        matches.truncate(top_k);

        info!(
            layers = plan.len(),
            results = matches.len(),
            "Layered search complete"
        );
        record_search(path_label(SearchPath::Layered), matches.len(), started.elapsed());

        SearchOutcome {
            matches,
            path: SearchPath::Layered,
            intent: intent.cloned(),
            served_from_cache: false,
        }
    }

    fn should_stop(&self, matches: &[ScoredMatch]) -> bool {
        let min = self.config.early_termination_min;
        min > 0
            && matches
                .iter()
                .filter(|m| m.adjusted_score >= self.config.similarity_threshold)
                .count()
                >= min
    }

    fn rerank(&self, matches: &mut [ScoredMatch], query: &str, intent: Option<&IntentAnalysis>) {
        let query_terms = key_terms(query);
        let blend = self.config.blend;

        for m in matches.iter_mut() {
            m.intent_relevance = intent.map_or(0.0, |i| self.matcher.relevance(i, m));

            let candidate_text = [m.question(), m.answer()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            m.concept_relevance = concept_relevance(&query_terms, &candidate_text);
            m.final_score = blend.combine(m.adjusted_score, m.intent_relevance, m.concept_relevance);
        }

        matches.sort_by(|a, b| b.final_score.total_cmp(&a.final_score).then_with(|| a.id.cmp(&b.id)));
    }
}

fn path_label(path: SearchPath) -> &'static str {
    match path {
        SearchPath::Composite => "composite",
        SearchPath::BareQuery => "bare_query",
        SearchPath::Layered => "layered",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::vector_index::{MockVectorIndex, VectorRecord};
    use crate::infrastructure::batch::BatchSchedulerConfig;
    use crate::infrastructure::cache::{CacheStore, InMemoryCache};
    use crate::infrastructure::operations::{EmbeddingHandler, OperationHandlers};
    use crate::infrastructure::orchestrator::OrchestratorConfig;
    use crate::infrastructure::vector_index::InMemoryVectorIndex;

    fn orchestrator(provider: Arc<MockEmbeddingProvider>) -> Orchestrator {
        Orchestrator::new(
            OperationHandlers::new().with_handler(Arc::new(EmbeddingHandler::new(provider))),
            CacheStore::new(Arc::new(InMemoryCache::new())),
            OrchestratorConfig::default(),
            BatchSchedulerConfig::default().with_collection_timeout(Duration::from_millis(5)),
        )
    }

    fn scorer_with(index: Arc<dyn VectorIndex>, config: RetrievalConfig) -> RetrievalScorer {
        let provider = Arc::new(MockEmbeddingProvider::new(64));
        RetrievalScorer::new(orchestrator(provider), index, config).unwrap()
    }

    fn intent() -> IntentAnalysis {
        IntentAnalysis::new("reset_password")
            .with_category("account")
            .with_keywords(["password"])
    }

    async fn seeded_index(provider: &MockEmbeddingProvider) -> Arc<InMemoryVectorIndex> {
        let index = Arc::new(InMemoryVectorIndex::new("faq"));
        let entries = [
            ("q1", "how do I reset my password"),
            ("q2", "where can I download my invoice"),
            ("q3", "how do I cancel my subscription"),
        ];
        index
            .upsert(
                entries
                    .iter()
                    .map(|(id, question)| {
                        VectorRecord::new(*id, provider.vector_for(question))
                            .with_metadata("question", *question)
                    })
                    .collect(),
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_composite_search_finds_closest_and_caches() {
        let provider = Arc::new(MockEmbeddingProvider::new(64));
        let index = seeded_index(&provider).await;
        let scorer =
            RetrievalScorer::new(orchestrator(provider.clone()), index, RetrievalConfig::default())
                .unwrap();

        let first = scorer.search_composite("reset my password", None, 2).await;
        let second = scorer.search_composite("reset my password", None, 2).await;

        assert_eq!(first.path, SearchPath::Composite);
        assert_eq!(first.matches.len(), 2);
        assert_eq!(first.matches[0].id, "q1");
        assert!(second.served_from_cache);
        assert_eq!(second.matches, first.matches);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_composite_dedupes_and_caps_at_top_k() {
        let mut index = MockVectorIndex::new();
        index.expect_query().times(1).returning(|query| {
            assert_eq!(query.top_k, 4);
            Ok(vec![
                VectorMatch::new("a", 0.9),
                VectorMatch::new("a", 0.8),
                VectorMatch::new("b", 0.7),
                VectorMatch::new("c", 0.6),
            ])
        });
        index.expect_index_name().return_const("mock".to_string());

        let scorer = scorer_with(Arc::new(index), RetrievalConfig::default());
        let outcome = scorer.search_composite("invoice", None, 2).await;

        let ids: Vec<&str> = outcome.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(outcome.matches[0].raw_similarity, 0.9);
    }

    #[tokio::test]
    async fn test_composite_failure_falls_back_to_bare_query() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut index = MockVectorIndex::new();
        index.expect_query().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DomainError::vector_index("composite rejected"))
            } else {
                Ok(vec![VectorMatch::new("a", 0.8)])
            }
        });
        index.expect_index_name().return_const("mock".to_string());

        let scorer = scorer_with(Arc::new(index), RetrievalConfig::default());
        let outcome = scorer.search_composite("refund", Some(&intent()), 3).await;

        assert_eq!(outcome.path, SearchPath::BareQuery);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_total_failure_returns_empty() {
        let mut index = MockVectorIndex::new();
        index
            .expect_query()
            .returning(|_| Err(DomainError::vector_index("index down")));
        index.expect_index_name().return_const("mock".to_string());

        let scorer = scorer_with(Arc::new(index), RetrievalConfig::default());
        let outcome = scorer.search_composite("refund", None, 3).await;

        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_layered_ranks_equal_similarity_by_layer_weight() {
        let layer = Arc::new(AtomicUsize::new(0));
        let counter = layer.clone();

        let mut index = MockVectorIndex::new();
        index.expect_query().returning(move |_| {
            // Every layer surfaces one new hit with the same raw similarity
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![VectorMatch::new(format!("hit-{}", n), 0.8)])
        });
        index.expect_index_name().return_const("mock".to_string());

        let config = RetrievalConfig::default().with_early_termination_min(0);
        let scorer = scorer_with(Arc::new(index), config);
        let intent = IntentAnalysis::new("reset_password")
            .with_category("account")
            .with_primary_action("reset")
            .with_keywords(["password"]);

        let outcome = scorer.search_layered("forgot pin", Some(&intent), 5).await;

        let layers: Vec<LayerKind> = outcome.matches.iter().map(|m| m.layer).collect();
        assert_eq!(layers, LayerKind::ALL.to_vec());
        assert!((outcome.matches[0].adjusted_score - 0.8).abs() < 1e-6);
        assert!((outcome.matches[1].adjusted_score - 0.68).abs() < 1e-6);
        assert_eq!(layer.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_layered_first_layer_wins_duplicates() {
        let mut index = MockVectorIndex::new();
        index
            .expect_query()
            .returning(|_| Ok(vec![VectorMatch::new("same", 0.5)]));
        index.expect_index_name().return_const("mock".to_string());

        let scorer = scorer_with(Arc::new(index), RetrievalConfig::default());
        let outcome = scorer.search_layered("forgot pin", Some(&intent()), 5).await;

        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].layer, LayerKind::Original);
    }

    #[tokio::test]
    async fn test_layered_early_termination() {
        let mut index = MockVectorIndex::new();
        index.expect_query().times(1).returning(|_| {
            Ok(vec![
                VectorMatch::new("a", 0.95),
                VectorMatch::new("b", 0.9),
                VectorMatch::new("c", 0.8),
            ])
        });
        index.expect_index_name().return_const("mock".to_string());

        let scorer = scorer_with(Arc::new(index), RetrievalConfig::default());
        let outcome = scorer.search_layered("forgot pin", Some(&intent()), 5).await;

        assert_eq!(outcome.matches.len(), 3);
    }

    #[tokio::test]
    async fn test_layered_rerank_rewards_matching_intent() {
        let mut index = MockVectorIndex::new();
        index.expect_query().returning(|_| {
            Ok(vec![
                VectorMatch::new("generic", 0.82).with_metadata("question", "shipping times"),
                VectorMatch::new("specific", 0.8)
                    .with_metadata("question", "reset password")
                    .with_metadata("core_intent", "reset_password")
                    .with_metadata("category", "account")
                    .with_metadata("keywords", "password"),
            ])
        });
        index.expect_index_name().return_const("mock".to_string());

        let scorer = scorer_with(Arc::new(index), RetrievalConfig::default());
        let outcome = scorer.search_layered("reset password", Some(&intent()), 2).await;

        assert_eq!(outcome.matches[0].id, "specific");
        assert!(outcome.matches[0].intent_relevance > 0.9);
        assert!(outcome.matches.iter().all(|m| (0.0..=1.0).contains(&m.final_score)));
    }

    #[tokio::test]
    async fn test_search_inquiry_without_intent_handler() {
        let provider = Arc::new(MockEmbeddingProvider::new(64));
        let index = seeded_index(&provider).await;
        let scorer =
            RetrievalScorer::new(orchestrator(provider), index, RetrievalConfig::default()).unwrap();

        let outcome = scorer
            .search_inquiry("cancel subscription", 1, SearchMode::Layered)
            .await;

        assert!(outcome.intent.is_none());
        assert_eq!(outcome.matches[0].id, "q3");
    }
}
