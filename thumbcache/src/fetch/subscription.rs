//! Cancellable handles for attached listeners.

use super::coordinator::Shared;
use crate::key::CacheKey;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Handle for one listener attached to a fetch.
///
/// After [`cancel`](Self::cancel) returns the listener's callback is never
/// invoked. Dropping a subscription does not cancel it.
pub struct Subscription {
    key: CacheKey,
    task_id: Option<u64>,
    listener_id: u64,
    cancelled: Arc<AtomicBool>,
    coordinator: Weak<Shared>,
}

impl Subscription {
    pub(super) fn attached(
        key: CacheKey,
        task_id: u64,
        listener_id: u64,
        cancelled: Arc<AtomicBool>,
        coordinator: Weak<Shared>,
    ) -> Self {
        Self {
            key,
            task_id: Some(task_id),
            listener_id,
            cancelled,
            coordinator,
        }
    }

    /// A handle for a request satisfied without a fetch task (memory hit,
    /// or refused after shutdown). Cancelling it is a no-op.
    pub fn completed(key: CacheKey) -> Self {
        Self {
            key,
            task_id: None,
            listener_id: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            coordinator: Weak::new(),
        }
    }

    /// Key this subscription was requested for.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Id of the fetch task this listener is attached to, if any.
    pub fn task_id(&self) -> Option<u64> {
        self.task_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Flag set by [`cancel`](Self::cancel), for deliveries made outside
    /// the coordinator.
    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Detach this listener. Idempotent.
    ///
    /// If it was the last listener of its task the task is abandoned: a
    /// queued task never runs, a running one finishes without delivering.
    /// Other listeners of the same task are unaffected.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let (Some(task_id), Some(shared)) = (self.task_id, self.coordinator.upgrade()) {
            shared.detach(&self.key, task_id, self.listener_id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("task_id", &self.task_id)
            .field("listener_id", &self.listener_id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
