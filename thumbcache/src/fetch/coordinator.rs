//! Request coalescing and the bounded worker pool.
//!
//! # Architecture
//!
//! ```text
//! request(K) ─┐                                      ┌─► listener 1
//! request(K) ─┼─► registry ──► FIFO queue ──► worker ┼─► listener 2
//! request(K) ─┘   (one task        │        (≤ N)    └─► listener 3
//!                  per key)    dispatcher                (via executor)
//! ```
//!
//! The registry maps each key to at most one in-flight task. A request for a
//! key already in flight attaches another listener instead of starting new
//! work. A single dispatcher pops tasks in FIFO order and waits for a worker
//! slot before spawning each one.
//!
//! When a task finishes it is removed from the registry first, then its
//! outcome is handed to every attached listener that has not cancelled. A
//! request arriving after removal always starts a fresh task.
//!
//! A task whose last listener detaches is abandoned: if still queued it is
//! skipped, if already running it completes (so the loader still fills its
//! caches) but delivers nothing.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor::CallbackExecutor;
use super::limiter::WorkerLimiter;
use super::subscription::Subscription;
use crate::blob::LoadedImage;
use crate::config::defaults::DEFAULT_FETCH_WORKERS;
use crate::error::LoadError;
use crate::key::CacheKey;

/// Outcome broadcast to every listener of a task.
pub type FetchOutcome = Result<LoadedImage, LoadError>;

/// Work performed by a fetch task.
pub type FetchFuture = BoxFuture<'static, FetchOutcome>;

/// Callback receiving a task outcome. Invoked at most once.
pub type Listener = Box<dyn FnOnce(FetchOutcome) + Send + 'static>;

/// Fetch coordinator configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum number of concurrently running fetch tasks.
    pub workers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_FETCH_WORKERS,
        }
    }
}

/// Snapshot of coordinator statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Total requests received
    pub total_requests: u64,
    /// Requests attached to an existing in-flight task
    pub coalesced_requests: u64,
    /// Requests that started a new task
    pub new_requests: u64,
    /// Tasks that delivered a success
    pub completed: u64,
    /// Tasks that delivered a failure
    pub failed: u64,
    /// Tasks dropped because every listener detached
    pub abandoned: u64,
    /// Tasks whose future panicked
    pub panicked: u64,
    /// Keys currently registered
    pub in_flight: usize,
    /// Workers currently running
    pub running: usize,
    /// Peak concurrent workers observed
    pub peak_running: usize,
}

impl FetchStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    panicked: AtomicU64,
}

struct AttachedListener {
    id: u64,
    cancelled: Arc<AtomicBool>,
    /// Locked only to make the registry `Sync`; taken once at delivery.
    callback: Mutex<Listener>,
}

/// Registry entry for one in-flight task.
struct InFlight {
    task_id: u64,
    listeners: Vec<AttachedListener>,
    /// Cancelled when the task is abandoned.
    token: CancellationToken,
}

struct QueuedTask {
    key: CacheKey,
    task_id: u64,
    token: CancellationToken,
    future: FetchFuture,
}

/// State shared by the coordinator, its workers and outstanding subscriptions.
pub(crate) struct Shared {
    registry: DashMap<CacheKey, InFlight>,
    executor: Arc<dyn CallbackExecutor>,
    counters: Counters,
    next_task_id: AtomicU64,
    next_listener_id: AtomicU64,
}

impl Shared {
    /// Remove one listener; abandon its task if no listeners remain.
    pub(super) fn detach(&self, key: &CacheKey, task_id: u64, listener_id: u64) {
        let mut removed = None;
        let mut now_empty = false;

        if let Some(mut entry) = self.registry.get_mut(key) {
            if entry.task_id == task_id {
                if let Some(pos) = entry.listeners.iter().position(|l| l.id == listener_id) {
                    removed = Some(entry.listeners.remove(pos));
                }
                now_empty = entry.listeners.is_empty();
            }
        }

        if now_empty {
            let abandoned = self
                .registry
                .remove_if(key, |_, e| e.task_id == task_id && e.listeners.is_empty());
            if let Some((_, entry)) = abandoned {
                entry.token.cancel();
                self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, task_id, "Fetch abandoned, no listeners left");
            }
        }

        // Callbacks are dropped outside the registry lock
        drop(removed);
    }

    /// Deliver a finished task's outcome to its listeners.
    fn complete(&self, key: &CacheKey, task_id: u64, outcome: FetchOutcome) {
        let Some((_, entry)) = self.registry.remove_if(key, |_, e| e.task_id == task_id) else {
            debug!(
                key = %key,
                task_id,
                success = outcome.is_ok(),
                "Fetch finished after abandonment, nothing to deliver"
            );
            return;
        };

        match &outcome {
            Ok(_) => self.counters.completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.counters.failed.fetch_add(1, Ordering::Relaxed),
        };

        let listeners = entry.listeners.len();
        for AttachedListener {
            cancelled, callback, ..
        } in entry.listeners
        {
            let outcome = outcome.clone();
            self.executor.execute(Box::new(move || {
                if !cancelled.load(Ordering::Acquire) {
                    (callback.into_inner())(outcome);
                }
            }));
        }

        match &outcome {
            Ok(image) => debug!(
                key = %key,
                task_id,
                listeners,
                source = %image.source,
                "Fetch complete"
            ),
            Err(e) => debug!(key = %key, task_id, listeners, error = %e, "Fetch failed"),
        }
    }

    /// Remove a task that could not be queued.
    fn discard(&self, key: &CacheKey, task_id: u64) {
        let discarded = self.registry.remove_if(key, |_, e| e.task_id == task_id);
        drop(discarded);
    }

    /// Abandon every in-flight task and detach every listener.
    fn abandon_all(&self) -> usize {
        let keys: Vec<CacheKey> = self.registry.iter().map(|e| e.key().clone()).collect();
        let mut dropped = Vec::with_capacity(keys.len());

        for key in keys {
            if let Some((_, entry)) = self.registry.remove(&key) {
                entry.token.cancel();
                for listener in &entry.listeners {
                    listener.cancelled.store(true, Ordering::Release);
                }
                dropped.push(entry);
            }
        }

        let abandoned = dropped.len();
        self.counters
            .abandoned
            .fetch_add(abandoned as u64, Ordering::Relaxed);
        abandoned
    }
}

/// Deduplicates fetches per key and runs them on a bounded worker pool.
///
/// Must be started from within a Tokio runtime.
pub struct FetchCoordinator {
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<QueuedTask>,
    limiter: Arc<WorkerLimiter>,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl FetchCoordinator {
    /// Start the coordinator and its dispatcher task.
    ///
    /// Completion callbacks are run through `executor`.
    pub fn start(config: FetchConfig, executor: Arc<dyn CallbackExecutor>) -> Self {
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let limiter = Arc::new(WorkerLimiter::new(workers));

        let shared = Arc::new(Shared {
            registry: DashMap::new(),
            executor,
            counters: Counters::default(),
            next_task_id: AtomicU64::new(1),
            next_listener_id: AtomicU64::new(1),
        });

        let dispatcher = tokio::spawn(run_dispatcher(
            rx,
            Arc::clone(&shared),
            Arc::clone(&limiter),
            shutdown.clone(),
        ));

        info!(workers, "Fetch coordinator started");

        Self {
            shared,
            queue: tx,
            limiter,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Attach `listener` to the in-flight task for `key`, or register a new
    /// task built by `make_fetch` and queue it.
    ///
    /// `make_fetch` is only called when a new task is needed. After
    /// [`shutdown`](Self::shutdown) the listener is dropped without being
    /// invoked.
    pub fn request<F>(&self, key: CacheKey, make_fetch: F, listener: Listener) -> Subscription
    where
        F: FnOnce() -> FetchFuture,
    {
        if self.shutdown.is_cancelled() {
            debug!(key = %key, "Request refused, coordinator is shut down");
            return Subscription::completed(key);
        }

        let counters = &self.shared.counters;
        counters.total_requests.fetch_add(1, Ordering::Relaxed);

        let listener_id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let attached = AttachedListener {
            id: listener_id,
            cancelled: Arc::clone(&cancelled),
            callback: Mutex::new(listener),
        };

        let (task_id, new_task) = match self.shared.registry.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.listeners.push(attached);
                counters.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(
                    key = %key,
                    task_id = entry.task_id,
                    listeners = entry.listeners.len(),
                    "Coalescing request onto in-flight fetch"
                );
                (entry.task_id, None)
            }
            Entry::Vacant(vacant) => {
                let task_id = self.shared.next_task_id.fetch_add(1, Ordering::Relaxed);
                let token = CancellationToken::new();
                vacant.insert(InFlight {
                    task_id,
                    listeners: vec![attached],
                    token: token.clone(),
                });
                counters.new_requests.fetch_add(1, Ordering::Relaxed);
                (task_id, Some(token))
            }
        };

        if let Some(token) = new_task {
            // Built outside the registry lock
            let task = QueuedTask {
                key: key.clone(),
                task_id,
                token,
                future: make_fetch(),
            };
            if self.queue.send(task).is_err() {
                self.shared.discard(&key, task_id);
                return Subscription::completed(key);
            }
            debug!(key = %key, task_id, "Fetch queued");
        }

        Subscription::attached(
            key,
            task_id,
            listener_id,
            cancelled,
            Arc::downgrade(&self.shared),
        )
    }

    /// Detach the listener behind `subscription`.
    pub fn cancel(&self, subscription: &Subscription) {
        subscription.cancel();
    }

    /// Detach every listener and abandon every in-flight task.
    ///
    /// Running tasks still finish, but deliver nothing.
    pub fn cancel_all(&self) -> usize {
        let abandoned = self.shared.abandon_all();
        if abandoned > 0 {
            info!(abandoned, "Cancelled all in-flight fetches");
        }
        abandoned
    }

    /// Stop the dispatcher, drop queued work and wait for running workers.
    ///
    /// Pending listeners are dropped without being invoked.
    pub async fn shutdown(&self) {
        info!("Fetch coordinator shutting down");
        self.shutdown.cancel();

        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let abandoned = self.shared.abandon_all();
        self.limiter.drain_and_close().await;

        info!(abandoned, "Fetch coordinator shutdown complete");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of keys with a registered task.
    pub fn in_flight_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn workers(&self) -> usize {
        self.limiter.max_concurrent()
    }

    pub fn stats(&self) -> FetchStats {
        let c = &self.shared.counters;
        FetchStats {
            total_requests: c.total_requests.load(Ordering::Relaxed),
            coalesced_requests: c.coalesced_requests.load(Ordering::Relaxed),
            new_requests: c.new_requests.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            abandoned: c.abandoned.load(Ordering::Relaxed),
            panicked: c.panicked.load(Ordering::Relaxed),
            in_flight: self.shared.registry.len(),
            running: self.limiter.in_flight(),
            peak_running: self.limiter.peak_in_flight(),
        }
    }

    /// Logs current statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_requests = stats.new_requests,
            completed = stats.completed,
            failed = stats.failed,
            abandoned = stats.abandoned,
            in_flight = stats.in_flight,
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Fetch coordinator statistics"
        );
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_dispatcher(
    mut queue: mpsc::UnboundedReceiver<QueuedTask>,
    shared: Arc<Shared>,
    limiter: Arc<WorkerLimiter>,
    shutdown: CancellationToken,
) {
    loop {
        let task = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            task = queue.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };

        if task.token.is_cancelled() {
            debug!(key = %task.key, task_id = task.task_id, "Skipping abandoned fetch");
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            permit = limiter.acquire() => match permit {
                Some(permit) => permit,
                None => break,
            },
        };

        // May have been abandoned while waiting for a worker
        if task.token.is_cancelled() {
            debug!(key = %task.key, task_id = task.task_id, "Skipping abandoned fetch");
            continue;
        }

        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let _permit = permit;
            let QueuedTask {
                key,
                task_id,
                future,
                ..
            } = task;

            let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(key = %key, task_id, panic = %message, "Fetch task panicked");
                    shared.counters.panicked.fetch_add(1, Ordering::Relaxed);
                    Err(LoadError::Internal(format!("fetch task panicked: {}", message)))
                }
            };

            shared.complete(&key, task_id, outcome);
        });
    }

    debug!("Fetch dispatcher stopped");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
