//! Per-operation batch queues drained by long-lived workers

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::BatchSchedulerConfig;
use crate::domain::orchestration::{OperationOutput, OperationType, Payload, Priority, Request};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_batch, record_queue_depth};
use crate::infrastructure::operations::{OperationHandler, OperationHandlers};

type BatchOutcome = Result<OperationOutput, DomainError>;

#[derive(Debug)]
struct QueuedItem {
    id: Uuid,
    priority: Priority,
    payload: Payload,
}

#[derive(Debug)]
struct CompletedResult {
    outcome: BatchOutcome,
    completed_at: Instant,
}

type ResultMap = Arc<Mutex<HashMap<Uuid, CompletedResult>>>;

#[derive(Debug, Default)]
struct QueueCounters {
    batches: AtomicU64,
    items: AtomicU64,
    failed_batches: AtomicU64,
    max_batch_size: AtomicUsize,
    depth: AtomicUsize,
}

impl QueueCounters {
    fn record(&self, size: usize, success: bool) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.items.fetch_add(size as u64, Ordering::Relaxed);
        self.max_batch_size.fetch_max(size, Ordering::Relaxed);
        if !success {
            self.failed_batches.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time statistics for one operation queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchQueueStats {
    pub batches_dispatched: u64,
    pub items_processed: u64,
    pub failed_batches: u64,
    pub average_batch_size: f64,
    pub max_batch_size: usize,
    pub queue_depth: usize,
    pub workers: usize,
    pub workers_alive: usize,
}

impl BatchQueueStats {
    pub fn all_workers_alive(&self) -> bool {
        self.workers_alive == self.workers
    }
}

/// Everything a worker needs, cloned once per worker
struct Worker {
    operation: OperationType,
    handler: Arc<dyn OperationHandler>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedItem>>>,
    results: ResultMap,
    counters: Arc<QueueCounters>,
    max_batch_size: usize,
    collection_timeout: Duration,
    retention: Duration,
}

impl Worker {
    async fn run(self) {
        debug!(operation = %self.operation, "Batch worker started");

        while let Some(batch) = self.collect().await {
            self.counters.depth.fetch_sub(batch.len(), Ordering::Relaxed);
            self.dispatch(batch).await;
            self.purge_expired();
        }

        debug!(operation = %self.operation, "Batch worker stopped");
    }

    /// Blocks for the first item, then drains until the size cap or the
    /// collection window closes. `None` once the queue is closed and empty.
    async fn collect(&self) -> Option<Vec<QueuedItem>> {
        let mut receiver = self.receiver.lock().await;

        let first = receiver.recv().await?;
        let deadline = Instant::now() + self.collection_timeout;
        let mut batch = vec![first];

        while batch.len() < self.max_batch_size {
            match tokio::time::timeout_at(deadline, receiver.recv()).await {
                Ok(Some(item)) => batch.push(item),
                Ok(None) | Err(_) => break,
            }
        }

        Some(batch)
    }

    async fn dispatch(&self, mut batch: Vec<QueuedItem>) {
        // Stable: equal priorities keep arrival order
        batch.sort_by_key(|item| item.priority);

        let size = batch.len();
        let payloads: Vec<Payload> = batch.iter().map(|item| item.payload.clone()).collect();
        let started = Instant::now();

        let outcome = match self.handler.execute_batch(&payloads).await {
            Ok(outputs) if outputs.len() == size => Ok(outputs),
            Ok(outputs) => Err(DomainError::batch(format!(
                "Expected {} results, received {}",
                size,
                outputs.len()
            ))),
            Err(e) => Err(e),
        };

        let success = outcome.is_ok();
        self.counters.record(size, success);
        record_batch(self.operation.as_str(), size, success, started.elapsed());

        let completed_at = Instant::now();
        let completed: Vec<(Uuid, BatchOutcome)> = match outcome {
            Ok(outputs) => {
                debug!(operation = %self.operation, size, "Batch completed");
                batch
                    .iter()
                    .zip(outputs)
                    .map(|(item, output)| (item.id, Ok(output)))
                    .collect()
            }
            Err(e) => {
                warn!(operation = %self.operation, size, error = %e, "Batch failed");
                batch.iter().map(|item| (item.id, Err(e.clone()))).collect()
            }
        };

        if let Ok(mut results) = self.results.lock() {
            for (id, outcome) in completed {
                results.insert(id, CompletedResult { outcome, completed_at });
            }
        }
    }

    fn purge_expired(&self) {
        if let Ok(mut results) = self.results.lock() {
            let before = results.len();
            results.retain(|_, r| r.completed_at.elapsed() < self.retention);

            let purged = before - results.len();
            if purged > 0 {
                debug!(operation = %self.operation, purged, "Purged unclaimed batch results");
            }
        }
    }
}

/// Groups requests per operation type into batches executed by a pool of workers
#[derive(Debug)]
pub struct BatchScheduler {
    senders: RwLock<HashMap<OperationType, mpsc::UnboundedSender<QueuedItem>>>,
    counters: HashMap<OperationType, Arc<QueueCounters>>,
    workers: Mutex<Vec<(OperationType, JoinHandle<()>)>>,
    worker_counts: HashMap<OperationType, usize>,
    results: ResultMap,
    config: BatchSchedulerConfig,
    closed: AtomicBool,
}

impl BatchScheduler {
    /// Starts `workers_per_operation` workers for every registered handler.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(handlers: &OperationHandlers, config: BatchSchedulerConfig) -> Self {
        let results: ResultMap = Arc::new(Mutex::new(HashMap::new()));
        let workers_per_operation = config.workers_per_operation.max(1);

        let mut senders = HashMap::new();
        let mut counters = HashMap::new();
        let mut worker_counts = HashMap::new();
        let mut workers = Vec::new();

        for (operation, handler) in handlers.iter() {
            let (sender, receiver) = mpsc::unbounded_channel();
            let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
            let queue_counters = Arc::new(QueueCounters::default());

            for _ in 0..workers_per_operation {
                let worker = Worker {
                    operation: *operation,
                    handler: handler.clone(),
                    receiver: receiver.clone(),
                    results: results.clone(),
                    counters: queue_counters.clone(),
                    max_batch_size: config.max_batch_size.max(1),
                    collection_timeout: config.collection_timeout(),
                    retention: config.result_retention(),
                };
                workers.push((*operation, tokio::spawn(worker.run())));
            }

            senders.insert(*operation, sender);
            counters.insert(*operation, queue_counters);
            worker_counts.insert(*operation, workers_per_operation);
        }

        info!(
            operations = senders.len(),
            workers_per_operation,
            max_batch_size = config.max_batch_size,
            collection_timeout_ms = config.collection_timeout_ms,
            "Batch scheduler started"
        );

        Self {
            senders: RwLock::new(senders),
            counters,
            workers: Mutex::new(workers),
            worker_counts,
            results,
            config,
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BatchSchedulerConfig {
        &self.config
    }

    /// Whether requests of this operation can be queued
    pub fn accepts(&self, operation: OperationType) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self
                .senders
                .read()
                .map(|senders| senders.contains_key(&operation))
                .unwrap_or(false)
    }

    /// Queues a request; its result is claimed with [`get_result`](Self::get_result)
    pub fn submit(&self, request: &Request) -> Result<Uuid, DomainError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DomainError::batch("Batch scheduler is shut down"));
        }

        let senders = self
            .senders
            .read()
            .map_err(|_| DomainError::internal("Batch queue lock poisoned"))?;
        let sender = senders.get(&request.operation).ok_or_else(|| {
            DomainError::batch(format!("No batch queue for {}", request.operation))
        })?;

        sender
            .send(QueuedItem {
                id: request.id,
                priority: request.priority,
                payload: request.payload.clone(),
            })
            .map_err(|_| DomainError::batch(format!("{} batch queue is closed", request.operation)))?;

        if let Some(counters) = self.counters.get(&request.operation) {
            let depth = counters.depth.fetch_add(1, Ordering::Relaxed) + 1;
            record_queue_depth(request.operation.as_str(), depth);
        }

        Ok(request.id)
    }

    fn take_result(&self, id: &Uuid) -> Option<BatchOutcome> {
        self.results
            .lock()
            .ok()
            .and_then(|mut results| results.remove(id))
            .map(|r| r.outcome)
    }

    /// Waits up to `timeout` for a submitted request's result.
    ///
    /// Polls the result map without holding its lock between checks; an
    /// expired wait is a timeout error.
    pub async fn get_result(&self, id: Uuid, timeout: Duration) -> BatchOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(outcome) = self.take_result(&id) {
                return outcome;
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DomainError::timeout(format!("batch result {}", id), timeout));
            }

            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
        }
    }

    /// Unclaimed results currently retained
    pub fn pending_results(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> BTreeMap<OperationType, BatchQueueStats> {
        let alive: HashMap<OperationType, usize> = self
            .workers
            .lock()
            .map(|workers| {
                workers.iter().fold(HashMap::new(), |mut acc, (op, handle)| {
                    if !handle.is_finished() {
                        *acc.entry(*op).or_insert(0) += 1;
                    }
                    acc
                })
            })
            .unwrap_or_default();

        self.counters
            .iter()
            .map(|(operation, c)| {
                let batches = c.batches.load(Ordering::Relaxed);
                let items = c.items.load(Ordering::Relaxed);

                let stats = BatchQueueStats {
                    batches_dispatched: batches,
                    items_processed: items,
                    failed_batches: c.failed_batches.load(Ordering::Relaxed),
                    average_batch_size: if batches == 0 { 0.0 } else { items as f64 / batches as f64 },
                    max_batch_size: c.max_batch_size.load(Ordering::Relaxed),
                    queue_depth: c.depth.load(Ordering::Relaxed),
                    workers: self.worker_counts.get(operation).copied().unwrap_or(0),
                    workers_alive: alive.get(operation).copied().unwrap_or(0),
                };
                (*operation, stats)
            })
            .collect()
    }

    /// Closes every queue and joins workers within `timeout`; stragglers are
    /// aborted. Items already queued are still dispatched while time remains.
    /// Returns the number of aborted workers.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        if self.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }

        if let Ok(mut senders) = self.senders.write() {
            senders.clear();
        }

        let workers = self
            .workers
            .lock()
            .map(|mut workers| std::mem::take(&mut *workers))
            .unwrap_or_default();

        let deadline = Instant::now() + timeout;
        let mut aborted = 0;

        for (operation, mut handle) in workers {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                warn!(operation = %operation, "Batch worker did not stop in time, aborting");
                handle.abort();
                aborted += 1;
            }
        }

        info!(aborted, "Batch scheduler stopped");
        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::operations::MockOperationHandler;

    fn config() -> BatchSchedulerConfig {
        BatchSchedulerConfig::default()
            .with_max_batch_size(10)
            .with_collection_timeout(Duration::from_millis(30))
    }

    fn scheduler_with(
        handler: Arc<MockOperationHandler>,
        config: BatchSchedulerConfig,
    ) -> BatchScheduler {
        BatchScheduler::start(&OperationHandlers::new().with_handler(handler), config)
    }

    fn translation(text: &str, priority: u8) -> Request {
        Request::new(Payload::translate(text, "es", "en")).with_priority(Priority::new(priority).unwrap())
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_requests_within_window_share_one_batch() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        let scheduler = scheduler_with(handler.clone(), config());

        let requests: Vec<Request> = (0..5).map(|i| translation(&format!("t{}", i), 5)).collect();
        let ids: Vec<Uuid> = requests.iter().map(|r| scheduler.submit(r).unwrap()).collect();

        for (i, id) in ids.iter().enumerate() {
            let output = scheduler.get_result(*id, WAIT).await.unwrap();
            assert_eq!(output.as_text(), Some(format!("done: t{}", i).as_str()));
        }

        assert_eq!(handler.batches().len(), 1);
        assert_eq!(handler.batches()[0].len(), 5);
        assert_eq!(scheduler.pending_results(), 0);
    }

    #[tokio::test]
    async fn test_batches_respect_size_cap() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        let scheduler = scheduler_with(handler.clone(), config().with_max_batch_size(2));

        let ids: Vec<Uuid> = (0..5)
            .map(|i| scheduler.submit(&translation(&format!("t{}", i), 5)).unwrap())
            .collect();
        for id in ids {
            scheduler.get_result(id, WAIT).await.unwrap();
        }

        let sizes: Vec<usize> = handler.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let stats = &scheduler.stats()[&OperationType::Translation];
        assert_eq!(stats.batches_dispatched, 3);
        assert_eq!(stats.items_processed, 5);
        assert_eq!(stats.max_batch_size, 2);
        assert_eq!(stats.queue_depth, 0);
        assert!(stats.all_workers_alive());
    }

    #[tokio::test]
    async fn test_batch_sorted_by_priority_stably() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        let scheduler = scheduler_with(handler.clone(), config());

        let requests = [
            translation("low", 9),
            translation("urgent", 1),
            translation("normal-a", 5),
            translation("normal-b", 5),
        ];
        let ids: Vec<Uuid> = requests.iter().map(|r| scheduler.submit(r).unwrap()).collect();

        let low = scheduler.get_result(ids[0], WAIT).await.unwrap();
        assert_eq!(low.as_text(), Some("done: low"));

        assert_eq!(
            handler.batches()[0],
            vec!["urgent", "normal-a", "normal-b", "low"]
        );
    }

    #[tokio::test]
    async fn test_remote_failure_fails_every_request() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        handler.set_failing(true);
        let scheduler = scheduler_with(handler.clone(), config());

        let ids: Vec<Uuid> = (0..3)
            .map(|i| scheduler.submit(&translation(&format!("t{}", i), 5)).unwrap())
            .collect();

        for id in ids {
            assert!(scheduler.get_result(id, WAIT).await.is_err());
        }
        assert_eq!(scheduler.stats()[&OperationType::Translation].failed_batches, 1);
    }

    #[tokio::test]
    async fn test_count_mismatch_fails_every_request() {
        let handler =
            Arc::new(MockOperationHandler::new(OperationType::Translation).with_short_batches());
        let scheduler = scheduler_with(handler, config());

        let ids: Vec<Uuid> = (0..3)
            .map(|i| scheduler.submit(&translation(&format!("t{}", i), 5)).unwrap())
            .collect();

        for id in ids {
            let error = scheduler.get_result(id, WAIT).await.unwrap_err();
            assert!(matches!(error, DomainError::Batch { .. }));
        }
    }

    #[tokio::test]
    async fn test_get_result_times_out() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        let scheduler = scheduler_with(handler, config());

        let error = scheduler
            .get_result(Uuid::new_v4(), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(error, DomainError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_unknown_operation_is_rejected() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        let scheduler = scheduler_with(handler, config());

        assert!(!scheduler.accepts(OperationType::Embedding));
        assert!(matches!(
            scheduler.submit(&Request::embed("hello")),
            Err(DomainError::Batch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unclaimed_results_are_purged() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        let scheduler = scheduler_with(
            handler,
            config()
                .with_collection_timeout(Duration::from_millis(1))
                .with_result_retention(Duration::from_millis(20)),
        );

        let abandoned = scheduler.submit(&translation("abandoned", 5)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let claimed = scheduler.submit(&translation("claimed", 5)).unwrap();
        scheduler.get_result(claimed, WAIT).await.unwrap();

        assert!(scheduler
            .get_result(abandoned, Duration::from_millis(10))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_rejects() {
        let handler = Arc::new(MockOperationHandler::new(OperationType::Translation));
        let scheduler = scheduler_with(handler, config());

        let queued = scheduler.submit(&translation("queued", 5)).unwrap();
        let aborted = scheduler.shutdown(WAIT).await;

        assert_eq!(aborted, 0);
        assert!(scheduler.get_result(queued, WAIT).await.is_ok());
        assert!(!scheduler.accepts(OperationType::Translation));
        assert!(matches!(
            scheduler.submit(&translation("late", 5)),
            Err(DomainError::Batch { .. })
        ));
        assert_eq!(scheduler.stats()[&OperationType::Translation].workers_alive, 0);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_stuck_workers() {
        let handler = Arc::new(
            MockOperationHandler::new(OperationType::Translation)
                .with_delay(Duration::from_secs(30)),
        );
        let scheduler = scheduler_with(
            handler,
            config().with_collection_timeout(Duration::from_millis(1)),
        );

        scheduler.submit(&translation("slow", 5)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let aborted = scheduler.shutdown(Duration::from_millis(50)).await;
        assert_eq!(aborted, 1);
    }
}
