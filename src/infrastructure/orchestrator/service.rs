//! Request orchestration: deduplication, strategy selection and caching

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::OrchestratorConfig;
use super::dedup::{Admission, LeaderTicket, RequestTables};
use crate::domain::orchestration::{
    IntentAnalysis, OperationOutput, OperationType, Payload, Priority, Request, Response,
    Strategy, StrategyHint,
};
use crate::domain::DomainError;
use crate::infrastructure::batch::{BatchQueueStats, BatchScheduler, BatchSchedulerConfig};
use crate::infrastructure::cache::{CacheStore, CacheStoreStats};
use crate::infrastructure::observability::{record_dedup, record_request};
use crate::infrastructure::operations::OperationHandlers;

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    absorbed: AtomicU64,
    replayed: AtomicU64,
    skipped: AtomicU64,
    batched: AtomicU64,
    immediate: AtomicU64,
    batch_fallbacks: AtomicU64,
    failures: AtomicU64,
    rejected: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

/// Point-in-time orchestrator statistics, polled by the health check
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: f64,
    pub in_flight_absorbed: u64,
    pub replayed: u64,
    /// Requests answered without a remote call of their own
    pub calls_saved: u64,
    pub skipped: u64,
    pub batched: u64,
    pub immediate: u64,
    pub batch_fallbacks: u64,
    pub failures: u64,
    pub validation_rejections: u64,
    pub in_flight: usize,
    pub batches: BTreeMap<OperationType, BatchQueueStats>,
    pub workers_healthy: bool,
    pub cache: CacheStoreStats,
}

/// How the leader of a request will serve it
enum Plan {
    Cached(OperationOutput),
    Skip,
    Batch,
    Immediate,
}

struct Inner {
    handlers: OperationHandlers,
    cache: CacheStore,
    scheduler: BatchScheduler,
    tables: Arc<RequestTables>,
    config: OrchestratorConfig,
    counters: Counters,
}

/// Shared entry point for every model invocation.
///
/// Cloning is cheap; all clones share the same tables, cache and workers.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("operations", &self.inner.handlers.operations())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Builds the orchestrator and starts the batch workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        handlers: OperationHandlers,
        cache: CacheStore,
        config: OrchestratorConfig,
        batch_config: BatchSchedulerConfig,
    ) -> Self {
        let scheduler = BatchScheduler::start(&handlers, batch_config);
        let tables = RequestTables::new(
            config.replay_window(),
            config.skip_window(),
            config.max_tracked_requests,
        );

        Self {
            inner: Arc::new(Inner {
                handlers,
                cache,
                scheduler,
                tables,
                config,
                counters: Counters::default(),
            }),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// Serves one request. Never fails: errors come back as `success = false`.
    pub async fn process(&self, request: Request) -> Response {
        let started = Instant::now();
        let counters = &self.inner.counters;
        let operation = request.operation;
        bump(&counters.total);

        let response = match request.validate() {
            Err(e) => {
                debug!(request_id = %request.id, error = %e, "Request rejected");
                bump(&counters.rejected);
                Response::failure(request.id, &e, Strategy::Rejected)
            }
            Ok(()) => self.admit(request).await,
        };

        if !response.success && response.strategy_used != Strategy::Rejected {
            bump(&counters.failures);
        }

        let response = response.with_latency(started.elapsed());
        record_request(
            operation.as_str(),
            response.strategy_used.as_str(),
            response.success,
            response.latency,
        );
        response
    }

    async fn admit(&self, request: Request) -> Response {
        let key = request.dedup_key();
        let repeated = self.inner.tables.touch(&key);
        let (id, timeout, operation) = (request.id, request.timeout, request.operation);

        match self.inner.tables.admit(&key, request.priority, request.require_fresh) {
            Admission::Replay(response) => {
                debug!(request_id = %id, operation = %operation, "Replaying recent outcome");
                bump(&self.inner.counters.replayed);
                record_dedup(operation.as_str(), "replayed");
                response.replayed(id)
            }
            Admission::Follower(follower) => {
                debug!(request_id = %id, operation = %operation, "Absorbed into in-flight request");
                bump(&self.inner.counters.absorbed);
                record_dedup(operation.as_str(), "absorbed");
                wait(follower.outcome, &follower.strategy, id, timeout)
                    .await
                    .for_request(id, true)
            }
            Admission::Leader(ticket) => {
                let Some(outcome) = ticket.subscribe() else {
                    return Response::failure(
                        id,
                        &DomainError::internal("request table unavailable"),
                        Strategy::Rejected,
                    );
                };
                let strategy = ticket.strategy();
                let inner = self.inner.clone();

                // Runs to completion even if this caller stops waiting
                tokio::spawn(async move {
                    let response = inner.serve(&request, &ticket, repeated).await;
                    ticket.complete(response);
                });

                wait(outcome, &strategy, id, timeout).await.for_request(id, false)
            }
        }
    }

    /// Embeds `text`, failing when the request does not produce a vector
    pub async fn embed(&self, text: &str, priority: Priority) -> Result<Vec<f32>, DomainError> {
        let response = self
            .process(Request::embed(text).with_priority(priority))
            .await;

        match value_of(response)? {
            Some(OperationOutput::Embedding(vector)) => Ok(vector),
            _ => Err(DomainError::internal("embedding request produced no vector")),
        }
    }

    /// Best-effort intent analysis; `None` when skipped or unavailable
    pub async fn analyze_intent(&self, text: &str) -> Option<IntentAnalysis> {
        let request = Request::new(Payload::analyze_intent(text))
            .with_priority(Priority::new(8).unwrap_or_default())
            .sheddable();

        match value_of(self.process(request).await) {
            Ok(Some(OperationOutput::Intent(intent))) if !intent.is_empty() => Some(intent),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Intent analysis unavailable");
                None
            }
        }
    }

    pub async fn stats(&self) -> OrchestratorStats {
        let c = &self.inner.counters;
        let cache_hits = load(&c.cache_hits);
        let cache_misses = load(&c.cache_misses);
        let lookups = cache_hits + cache_misses;
        let absorbed = load(&c.absorbed);
        let replayed = load(&c.replayed);
        let skipped = load(&c.skipped);
        let batches = self.inner.scheduler.stats();

        OrchestratorStats {
            total_requests: load(&c.total),
            cache_hits,
            cache_misses,
            cache_hit_ratio: if lookups == 0 { 0.0 } else { cache_hits as f64 / lookups as f64 },
            in_flight_absorbed: absorbed,
            replayed,
            calls_saved: cache_hits + absorbed + replayed + skipped,
            skipped,
            batched: load(&c.batched),
            immediate: load(&c.immediate),
            batch_fallbacks: load(&c.batch_fallbacks),
            failures: load(&c.failures),
            validation_rejections: load(&c.rejected),
            in_flight: self.inner.tables.in_flight(),
            workers_healthy: batches.values().all(BatchQueueStats::all_workers_alive),
            batches,
            cache: self.inner.cache.stats().await,
        }
    }

    /// Stops the batch workers with the configured bounded join
    pub async fn shutdown(&self) {
        let timeout = self.inner.scheduler.config().shutdown_timeout();
        self.inner.scheduler.shutdown(timeout).await;
    }
}

/// Unwraps a response into its value, turning failures into errors
fn value_of(response: Response) -> Result<Option<OperationOutput>, DomainError> {
    if response.success {
        Ok(response.value)
    } else {
        Err(DomainError::provider(
            "orchestrator",
            response.error.unwrap_or_else(|| "request failed".to_string()),
        ))
    }
}

/// Waits for a published outcome, bounded by the caller's own timeout
async fn wait(
    mut outcome: watch::Receiver<Option<Response>>,
    strategy: &OnceLock<Strategy>,
    id: Uuid,
    timeout: Duration,
) -> Response {
    let published = match tokio::time::timeout(timeout, outcome.wait_for(|r| r.is_some())).await {
        Ok(Ok(value)) => (*value).clone(),
        Ok(Err(_)) => None,
        Err(_) => {
            let strategy = strategy.get().copied().unwrap_or(Strategy::Immediate);
            return Response::failure(id, &DomainError::timeout("request", timeout), strategy);
        }
    };

    published.unwrap_or_else(|| {
        Response::failure(
            id,
            &DomainError::internal("request ended without an outcome"),
            Strategy::Immediate,
        )
    })
}

impl Inner {
    fn batch_eligible(&self, operation: OperationType, priority: Priority) -> bool {
        priority.value() > self.config.batch_priority_cutoff && self.scheduler.accepts(operation)
    }

    async fn lookup(&self, request: &Request) -> Option<OperationOutput> {
        let cached = self
            .cache
            .get::<OperationOutput>(request.operation.namespace(), &request.payload.cache_content())
            .await;

        bump(if cached.is_some() {
            &self.counters.cache_hits
        } else {
            &self.counters.cache_misses
        });
        cached
    }

    async fn plan(&self, request: &Request, priority: Priority, repeated: bool) -> Plan {
        let batchable = self.batch_eligible(request.operation, priority);

        match request.strategy_hint {
            Some(StrategyHint::Skip) if request.sheddable => return Plan::Skip,
            Some(StrategyHint::Immediate) => return Plan::Immediate,
            Some(StrategyHint::Batch) => return Plan::Batch,
            Some(StrategyHint::Cache) => {
                return match self.lookup(request).await {
                    Some(output) => Plan::Cached(output),
                    None => Plan::Immediate,
                };
            }
            Some(StrategyHint::Skip) | None => {}
        }

        if request.require_fresh {
            return if batchable { Plan::Batch } else { Plan::Immediate };
        }

        if let Some(output) = self.lookup(request).await {
            return Plan::Cached(output);
        }

        if request.sheddable && repeated && priority.value() >= self.config.skip_priority_threshold {
            return Plan::Skip;
        }

        if batchable { Plan::Batch } else { Plan::Immediate }
    }

    async fn serve(&self, request: &Request, ticket: &LeaderTicket, repeated: bool) -> Response {
        let priority = ticket.priority();

        match self.plan(request, priority, repeated).await {
            Plan::Cached(output) => {
                ticket.select_strategy(Strategy::Cache);
                Response::success(request.id, output, Strategy::Cache)
            }
            Plan::Skip => {
                ticket.select_strategy(Strategy::Skip);
                debug!(request_id = %request.id, operation = %request.operation, "Request skipped");
                bump(&self.counters.skipped);
                Response::skipped(request.id)
            }
            Plan::Batch => self.batched(request, priority, ticket).await,
            Plan::Immediate => self.immediate(request, ticket).await,
        }
    }

    async fn batched(&self, request: &Request, priority: Priority, ticket: &LeaderTicket) -> Response {
        // Queue position is fixed here; requests absorbed later do not re-sort it
        let queued = request.clone().with_priority(priority);

        let id = match self.scheduler.submit(&queued) {
            Ok(id) => id,
            Err(e) => {
                warn!(operation = %request.operation, error = %e, "Batch queue unavailable, executing immediately");
                bump(&self.counters.batch_fallbacks);
                return self.immediate(request, ticket).await;
            }
        };

        ticket.select_strategy(Strategy::Batch);
        bump(&self.counters.batched);

        // Bounded by retention rather than the caller, whose wait is separate
        let deadline = request.timeout.max(self.scheduler.config().result_retention());

        match self.scheduler.get_result(id, deadline).await {
            Ok(output) => self.succeed(request, output, Strategy::Batch).await,
            Err(e) => Response::failure(request.id, &e, Strategy::Batch),
        }
    }

    async fn immediate(&self, request: &Request, ticket: &LeaderTicket) -> Response {
        ticket.select_strategy(Strategy::Immediate);
        bump(&self.counters.immediate);

        let Some(handler) = self.handlers.get(request.operation) else {
            let error = DomainError::configuration(format!(
                "No handler registered for {}",
                request.operation
            ));
            return Response::failure(request.id, &error, Strategy::Immediate);
        };

        match self
            .config
            .retry
            .run(|| handler.execute(&request.payload))
            .await
        {
            Ok(output) => self.succeed(request, output, Strategy::Immediate).await,
            Err(e) => {
                warn!(operation = %request.operation, error = %e, "Immediate call failed");
                Response::failure(request.id, &e, Strategy::Immediate)
            }
        }
    }

    /// Caches a fresh result before it is returned
    async fn succeed(&self, request: &Request, output: OperationOutput, strategy: Strategy) -> Response {
        self.cache
            .set(
                request.operation.namespace(),
                &request.payload.cache_content(),
                &output,
                None,
            )
            .await;

        Response::success(request.id, output, strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::infrastructure::cache::InMemoryCache;
    use crate::infrastructure::operations::EmbeddingHandler;
    use crate::infrastructure::orchestrator::RetryPolicy;
    use futures::future::join_all;

    fn orchestrator_with(provider: Arc<MockEmbeddingProvider>, config: OrchestratorConfig) -> Orchestrator {
        let handlers =
            OperationHandlers::new().with_handler(Arc::new(EmbeddingHandler::new(provider)));
        let batch = BatchSchedulerConfig::default()
            .with_max_batch_size(10)
            .with_collection_timeout(Duration::from_millis(20));

        Orchestrator::new(
            handlers,
            CacheStore::new(Arc::new(InMemoryCache::new())),
            config.with_retry(RetryPolicy::new(3).with_initial_delay(1).with_jitter(0.0)),
            batch,
        )
    }

    fn orchestrator(provider: Arc<MockEmbeddingProvider>) -> Orchestrator {
        orchestrator_with(provider, OrchestratorConfig::default())
    }

    fn priority(value: u8) -> Priority {
        Priority::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_five_concurrent_identical_requests_make_one_call() {
        let provider = Arc::new(MockEmbeddingProvider::new(32).with_delay(Duration::from_millis(50)));
        let orchestrator = orchestrator(provider.clone());

        let responses = join_all(
            (0..5).map(|_| orchestrator.process(Request::embed("how do I reset my password"))),
        )
        .await;

        assert_eq!(provider.calls(), 1);
        assert!(responses.iter().all(|r| r.success));
        assert_eq!(responses.iter().filter(|r| r.deduplicated).count(), 4);

        let expected = provider.vector_for("how do I reset my password");
        for response in &responses {
            assert_eq!(
                response.value.as_ref().and_then(|v| v.as_embedding()),
                Some(expected.as_slice())
            );
        }

        let stats = orchestrator.stats().await;
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.in_flight_absorbed, 4);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_repeat_within_replay_window_is_replayed() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let orchestrator = orchestrator(provider.clone());

        let first = orchestrator.process(Request::embed("billing question")).await;
        let second = orchestrator.process(Request::embed("billing question")).await;

        assert_eq!(first.strategy_used, Strategy::Batch);
        assert_eq!(second.strategy_used, Strategy::Replay);
        assert!(second.deduplicated && !second.served_from_cache);
        assert_eq!(first.value, second.value);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_repeat_after_replay_window_is_served_from_cache() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let orchestrator = orchestrator_with(
            provider.clone(),
            OrchestratorConfig::default().with_replay_window(Duration::ZERO),
        );

        let first = orchestrator.process(Request::embed("billing question")).await;
        let second = orchestrator.process(Request::embed("billing question")).await;

        assert!(second.served_from_cache);
        assert_eq!(second.strategy_used, Strategy::Cache);
        assert_eq!(first.value, second.value);
        assert_eq!(provider.calls(), 1);

        let stats = orchestrator.stats().await;
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.calls_saved, 1);
    }

    #[tokio::test]
    async fn test_require_fresh_skips_cache_and_replay() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let orchestrator = orchestrator(provider.clone());

        orchestrator.process(Request::embed("fresh")).await;
        let fresh = orchestrator
            .process(Request::embed("fresh").with_require_fresh(true))
            .await;

        assert!(fresh.success && !fresh.served_from_cache);
        assert_ne!(fresh.strategy_used, Strategy::Replay);
        assert!(!fresh.deduplicated);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_without_calls() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let orchestrator = orchestrator(provider.clone());

        let response = orchestrator.process(Request::embed("   ")).await;

        assert!(!response.success);
        assert_eq!(response.strategy_used, Strategy::Rejected);
        assert!(response.error.unwrap().contains("Validation"));
        assert_eq!(provider.calls(), 0);

        let stats = orchestrator.stats().await;
        assert_eq!(stats.validation_rejections, 1);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_urgent_requests_run_immediately_with_retries() {
        let provider = Arc::new(MockEmbeddingProvider::new(16).with_transient_failures(2));
        let orchestrator = orchestrator(provider.clone());

        let response = orchestrator
            .process(Request::embed("urgent").with_priority(Priority::HIGHEST))
            .await;

        assert!(response.success);
        assert_eq!(response.strategy_used, Strategy::Immediate);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_failure_fails_every_member_and_caches_nothing() {
        let provider = Arc::new(MockEmbeddingProvider::new(16).with_short_response());
        let orchestrator = orchestrator(provider.clone());

        let responses = join_all(
            ["one", "two", "three"]
                .into_iter()
                .map(|text| orchestrator.process(Request::embed(text))),
        )
        .await;

        assert!(responses.iter().all(|r| !r.success));
        assert!(responses.iter().all(|r| r.strategy_used == Strategy::Batch));
        assert_eq!(provider.batch_sizes(), vec![3]);
        assert_eq!(orchestrator.cache().stats().await.namespaces.values().map(|n| n.writes).sum::<u64>(), 0);
    }

    #[tokio::test]
    async fn test_repeated_sheddable_request_is_skipped() {
        let provider = Arc::new(MockEmbeddingProvider::new(16).with_error("down"));
        let orchestrator = orchestrator(provider.clone());
        let request = || Request::embed("nice to have").with_priority(priority(9)).sheddable();

        let first = orchestrator.process(request()).await;
        let second = orchestrator.process(request()).await;

        assert!(!first.success);
        assert!(second.success && second.is_skipped());
        assert!(second.value.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_skip_hint_ignored_for_critical_requests() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let orchestrator = orchestrator(provider.clone());

        let critical = orchestrator
            .process(Request::embed("critical").with_strategy_hint(StrategyHint::Skip))
            .await;
        let optional = orchestrator
            .process(
                Request::embed("optional")
                    .with_strategy_hint(StrategyHint::Skip)
                    .sheddable(),
            )
            .await;

        assert!(critical.value.is_some());
        assert!(optional.is_skipped());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_caller_does_not_cancel_the_call() {
        let provider = Arc::new(MockEmbeddingProvider::new(16).with_delay(Duration::from_millis(80)));
        let orchestrator = orchestrator(provider.clone());

        let impatient = orchestrator
            .process(
                Request::embed("slow")
                    .with_priority(Priority::HIGHEST)
                    .with_timeout(Duration::from_millis(10)),
            )
            .await;
        assert!(!impatient.success);
        assert!(impatient.error.unwrap().contains("Timed out"));

        tokio::time::sleep(Duration::from_millis(150)).await;

        let later = orchestrator
            .process(Request::embed("slow").with_priority(Priority::HIGHEST))
            .await;
        assert_eq!(later.strategy_used, Strategy::Replay);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_caller_does_not_cancel_a_batched_call() {
        let provider = Arc::new(MockEmbeddingProvider::new(16).with_delay(Duration::from_millis(80)));
        let orchestrator = orchestrator(provider.clone());

        let impatient = orchestrator
            .process(Request::embed("slow batched").with_timeout(Duration::from_millis(10)))
            .await;
        assert!(!impatient.success);
        assert_eq!(impatient.strategy_used, Strategy::Batch);

        tokio::time::sleep(Duration::from_millis(300)).await;

        let writes: u64 = orchestrator
            .cache()
            .stats()
            .await
            .namespaces
            .values()
            .map(|n| n.writes)
            .sum();
        assert_eq!(writes, 1);

        let later = orchestrator.process(Request::embed("slow batched")).await;
        assert!(later.success);
        assert_eq!(later.strategy_used, Strategy::Replay);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_falls_back_to_immediate_after_shutdown() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let orchestrator = orchestrator(provider.clone());

        orchestrator.shutdown().await;
        let response = orchestrator
            .process(Request::embed("after shutdown").with_strategy_hint(StrategyHint::Batch))
            .await;

        assert!(response.success);
        assert_eq!(response.strategy_used, Strategy::Immediate);
        assert_eq!(orchestrator.stats().await.batch_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_embed_helper() {
        let provider = Arc::new(MockEmbeddingProvider::new(16));
        let orchestrator = orchestrator(provider.clone());

        let vector = orchestrator.embed("hello", Priority::NORMAL).await.unwrap();
        assert_eq!(vector, provider.vector_for("hello"));
    }
}
