//! Worker pool limiter.
//!
//! A fair semaphore bounds how many fetch tasks run at once. Permits are
//! owned so they can move into spawned worker tasks; dropping a permit
//! frees its slot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of concurrently running workers.
#[derive(Debug)]
pub struct WorkerLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
    in_flight: Arc<AtomicUsize>,
    /// Peak concurrent workers observed
    peak_in_flight: AtomicUsize,
}

impl WorkerLimiter {
    /// Creates a limiter allowing `max_concurrent` workers.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_permits: max_concurrent,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Waits for a free worker slot.
    ///
    /// Returns `None` once the limiter has been closed. Waiters are served
    /// in FIFO order.
    pub async fn acquire(&self) -> Option<WorkerPermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(self.track(permit))
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> WorkerPermit {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.update_peak(current);
        WorkerPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// Waits until every running worker has released its permit, then
    /// closes the limiter so no new worker can start.
    pub async fn drain_and_close(&self) {
        let permits = u32::try_from(self.max_permits).unwrap_or(u32::MAX);
        if let Ok(all) = self.semaphore.acquire_many(permits).await {
            all.forget();
        }
        self.semaphore.close();
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    /// Workers currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }
}

/// A worker slot. Released on drop.
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}
