//! Pending and recent request tables used for deduplication and replay.
//!
//! Both tables are transient and guarded by std mutexes that are never held
//! across an await point. Lock order is always in-flight before recent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::domain::orchestration::{Priority, Response, Strategy};
use crate::domain::DomainError;

type Outcome = watch::Receiver<Option<Response>>;

struct InFlight {
    sender: watch::Sender<Option<Response>>,
    priority: Arc<AtomicU8>,
    strategy: Arc<OnceLock<Strategy>>,
}

struct Recent {
    response: Response,
    completed_at: Instant,
}

/// How an incoming request is admitted
pub(crate) enum Admission {
    /// First of its kind: the caller must execute it
    Leader(LeaderTicket),
    /// An identical request is running; wait for its outcome
    Follower(Follower),
    /// An identical request completed within the replay window
    Replay(Response),
}

pub(crate) struct Follower {
    pub outcome: Outcome,
    pub strategy: Arc<OnceLock<Strategy>>,
}

/// Ownership of an in-flight entry.
///
/// Completing publishes the outcome to every waiter; dropping an
/// uncompleted ticket publishes a failure so waiters never hang.
pub(crate) struct LeaderTicket {
    key: String,
    tables: Arc<RequestTables>,
    priority: Arc<AtomicU8>,
    strategy: Arc<OnceLock<Strategy>>,
    completed: bool,
}

impl LeaderTicket {
    /// Current priority, raised by any absorbed identical request
    pub fn priority(&self) -> Priority {
        Priority::new(self.priority.load(Ordering::SeqCst)).unwrap_or_default()
    }

    pub fn select_strategy(&self, strategy: Strategy) {
        let _ = self.strategy.set(strategy);
    }

    pub fn strategy(&self) -> Arc<OnceLock<Strategy>> {
        self.strategy.clone()
    }

    pub fn subscribe(&self) -> Option<Outcome> {
        self.tables.subscribe(&self.key)
    }

    pub fn complete(mut self, response: Response) {
        self.completed = true;
        self.tables.complete(&self.key, response);
    }
}

impl Drop for LeaderTicket {
    fn drop(&mut self) {
        if !self.completed {
            let error = DomainError::internal("request execution was abandoned");
            let strategy = self.strategy.get().copied().unwrap_or(Strategy::Immediate);
            self.tables.complete(
                &self.key,
                Response::failure(uuid::Uuid::nil(), &error, strategy),
            );
        }
    }
}

pub(crate) struct RequestTables {
    in_flight: Mutex<HashMap<String, InFlight>>,
    recent: Mutex<HashMap<String, Recent>>,
    seen: Mutex<HashMap<String, Instant>>,
    replay_window: Duration,
    skip_window: Duration,
    max_entries: usize,
}

impl RequestTables {
    pub fn new(replay_window: Duration, skip_window: Duration, max_entries: usize) -> Arc<Self> {
        Arc::new(Self {
            in_flight: Mutex::new(HashMap::new()),
            recent: Mutex::new(HashMap::new()),
            seen: Mutex::new(HashMap::new()),
            replay_window,
            skip_window,
            max_entries: max_entries.max(1),
        })
    }

    /// Admits a request, absorbing it into an identical in-flight request
    /// (raising that one's priority) or replaying a recent outcome when possible.
    ///
    /// A `fresh` request may still join an in-flight call but is never replayed.
    pub fn admit(self: &Arc<Self>, key: &str, priority: Priority, fresh: bool) -> Admission {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return self.leader_without_table(key, priority);
        };

        if let Some(entry) = in_flight.get(key) {
            entry.priority.fetch_min(priority.value(), Ordering::SeqCst);
            return Admission::Follower(Follower {
                outcome: entry.sender.subscribe(),
                strategy: entry.strategy.clone(),
            });
        }

        if !fresh {
            if let Some(response) = self.recent_response(key) {
                return Admission::Replay(response);
            }
        }

        let (sender, _) = watch::channel(None);
        let entry = InFlight {
            sender,
            priority: Arc::new(AtomicU8::new(priority.value())),
            strategy: Arc::new(OnceLock::new()),
        };
        let ticket = LeaderTicket {
            key: key.to_string(),
            tables: self.clone(),
            priority: entry.priority.clone(),
            strategy: entry.strategy.clone(),
            completed: false,
        };
        in_flight.insert(key.to_string(), entry);

        Admission::Leader(ticket)
    }

    fn leader_without_table(self: &Arc<Self>, key: &str, priority: Priority) -> Admission {
        Admission::Leader(LeaderTicket {
            key: key.to_string(),
            tables: self.clone(),
            priority: Arc::new(AtomicU8::new(priority.value())),
            strategy: Arc::new(OnceLock::new()),
            completed: false,
        })
    }

    fn recent_response(&self, key: &str) -> Option<Response> {
        let recent = self.recent.lock().ok()?;
        recent
            .get(key)
            .filter(|r| r.completed_at.elapsed() < self.replay_window)
            .map(|r| r.response.clone())
    }

    fn subscribe(&self, key: &str) -> Option<Outcome> {
        self.in_flight
            .lock()
            .ok()?
            .get(key)
            .map(|entry| entry.sender.subscribe())
    }

    /// Publishes an outcome; successful non-skipped outcomes become replayable
    fn complete(&self, key: &str, response: Response) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };

        if response.success && !response.is_skipped() {
            if let Ok(mut recent) = self.recent.lock() {
                if recent.len() >= self.max_entries {
                    recent.retain(|_, r| r.completed_at.elapsed() < self.replay_window);
                }
                if recent.len() >= self.max_entries {
                    if let Some(oldest) = recent
                        .iter()
                        .min_by_key(|(_, r)| r.completed_at)
                        .map(|(k, _)| k.clone())
                    {
                        recent.remove(&oldest);
                    }
                }
                recent.insert(
                    key.to_string(),
                    Recent {
                        response: response.clone(),
                        completed_at: Instant::now(),
                    },
                );
            }
        }

        if let Some(entry) = in_flight.remove(key) {
            entry.sender.send_replace(Some(response));
        }
    }

    /// Records a sighting, returning whether the same request was already
    /// seen within the skip window
    pub fn touch(&self, key: &str) -> bool {
        let Ok(mut seen) = self.seen.lock() else {
            return false;
        };

        let now = Instant::now();
        if seen.len() >= self.max_entries {
            seen.retain(|_, at| now.duration_since(*at) < self.skip_window);
        }

        seen.insert(key.to_string(), now)
            .is_some_and(|previous| now.duration_since(previous) < self.skip_window)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().map(|m| m.len()).unwrap_or(0)
    }
}
