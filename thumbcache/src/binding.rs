//! Display slots that are recycled between images.
//!
//! A scrolling list reuses a small pool of slots. When a slot is rebound to
//! a new image, the request for its previous image must not deliver into
//! it. [`ImageSlot`] cancels the previous subscription on every bind and
//! also checks, at delivery time, that the completed key is still the one
//! the slot wants.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::fetch::{FetchOutcome, Subscription};
use crate::key::CacheKey;
use crate::loader::ImageLoader;

#[derive(Default)]
struct SlotState {
    desired: Option<CacheKey>,
    subscription: Option<Subscription>,
    /// Set by `bind`, cleared once the desired outcome is delivered.
    loading: bool,
}

/// One recyclable display slot.
#[derive(Clone, Default)]
pub struct ImageSlot {
    state: Arc<Mutex<SlotState>>,
}

impl ImageSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point this slot at `identifier`.
    ///
    /// Cancels whatever the slot was loading before. `on_result` runs only
    /// if the slot still wants this image when the outcome arrives.
    pub fn bind<F>(&self, loader: &ImageLoader, identifier: &str, on_result: F)
    where
        F: FnOnce(FetchOutcome) + Send + 'static,
    {
        let key = loader.key_for(identifier);

        let previous = {
            let mut state = self.state.lock();
            state.desired = Some(key.clone());
            state.loading = true;
            state.subscription.take()
        };
        if let Some(previous) = previous {
            previous.cancel();
        }

        let state = Arc::clone(&self.state);
        let bound_key = key.clone();
        // Resolving may deliver inline, so no lock is held here
        let subscription = loader.resolve_with_key(key, identifier, move |outcome| {
            let wanted = {
                let mut state = state.lock();
                let wanted = state.desired.as_ref() == Some(&bound_key);
                if wanted {
                    state.loading = false;
                    state.subscription = None;
                }
                wanted
            };
            if wanted {
                on_result(outcome);
            } else {
                debug!(key = %bound_key, "Dropping result for a slot that moved on");
            }
        });

        let mut state = self.state.lock();
        if state.desired.as_ref() != Some(subscription.key()) {
            // Rebound or unbound while resolving
            drop(state);
            subscription.cancel();
        } else if state.loading && state.subscription.is_none() {
            state.subscription = Some(subscription);
        }
        // Otherwise the outcome was already delivered
    }

    /// Cancel any pending load and forget the desired image.
    pub fn unbind(&self) {
        let previous = {
            let mut state = self.state.lock();
            state.desired = None;
            state.loading = false;
            state.subscription.take()
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Key of the image this slot currently wants.
    pub fn desired_key(&self) -> Option<CacheKey> {
        self.state.lock().desired.clone()
    }

    /// Whether the slot is still waiting for its desired image.
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::ImageSource;
    use crate::error::LoadError;
    use crate::fetch::ChannelExecutor;
    use crate::testing::{
        create_test_config, create_test_loader, wait_until, MockOrigin, StubDecoder,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::sync::{mpsc, Semaphore};

    #[tokio::test]
    async fn test_bind_delivers_to_slot() {
        let temp_dir = TempDir::new().unwrap();
        let loader = create_test_loader(temp_dir.path(), MockOrigin::new());
        let slot = ImageSlot::new();

        let (tx, mut rx) = mpsc::unbounded_channel();
        slot.bind(&loader, "img://one", move |outcome| {
            let _ = tx.send(outcome);
        });

        let image = rx.recv().await.unwrap().unwrap();
        assert_eq!(image.blob.pixels()[0], b'e');
        assert_eq!(slot.desired_key(), Some(loader.key_for("img://one")));
    }

    #[tokio::test]
    async fn test_rebind_drops_stale_result() {
        let temp_dir = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let origin = MockOrigin::gated(&gate);
        let loader = create_test_loader(temp_dir.path(), Arc::clone(&origin));
        let slot = ImageSlot::new();

        let stale = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&stale);
        slot.bind(&loader, "img://old", move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        wait_until(|| origin.calls() == 1).await;
        assert!(slot.is_loading());

        let (tx, mut rx) = mpsc::unbounded_channel();
        slot.bind(&loader, "img://new", move |outcome| {
            let _ = tx.send(outcome);
        });
        gate.add_permits(2);

        let image = rx.recv().await.unwrap().unwrap();
        assert_eq!(image.blob.pixels()[0], b'w');

        // The old fetch still fills the cache
        let old_key = loader.key_for("img://old");
        wait_until(|| loader.memory().contains(&old_key)).await;
        assert_eq!(stale.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rebind_drops_queued_memory_hit() {
        let temp_dir = TempDir::new().unwrap();
        let (executor, mut queue) = ChannelExecutor::new();
        let loader = ImageLoader::builder(create_test_config(temp_dir.path()))
            .origin(MockOrigin::new())
            .decoder(Arc::new(StubDecoder))
            .executor(Arc::new(executor))
            .build()
            .unwrap();

        // Warm memory so the next bind delivers through the queue
        loader.resolve("img://a", |_| {});
        assert!(queue.run_next().await);

        let slot = ImageSlot::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&delivered);
        slot.bind(&loader, "img://a", move |outcome| {
            assert_eq!(outcome.unwrap().source, ImageSource::Memory);
            d.fetch_add(1, Ordering::SeqCst);
        });
        slot.bind(&loader, "img://b", |_| {});

        // The memory-hit job for img://a is already queued
        queue.run_pending();
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unbind_cancels() {
        let temp_dir = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let origin = MockOrigin::gated(&gate);
        let loader = create_test_loader(temp_dir.path(), Arc::clone(&origin));
        let slot = ImageSlot::new();

        let delivered = Arc::new(AtomicUsize::new(0));
        let d = Arc::clone(&delivered);
        slot.bind(&loader, "img://gone", move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });
        wait_until(|| origin.calls() == 1).await;

        slot.unbind();
        assert!(slot.desired_key().is_none());
        assert!(!slot.is_loading());
        assert_eq!(loader.in_flight_count(), 0);

        gate.add_permits(1);
        let key = loader.key_for("img://gone");
        wait_until(|| loader.memory().contains(&key)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_memory_hit_binds_without_pending_load() {
        let temp_dir = TempDir::new().unwrap();
        let loader = create_test_loader(temp_dir.path(), MockOrigin::new());
        loader.load("img://warm").await.unwrap();

        let slot = ImageSlot::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        slot.bind(&loader, "img://warm", move |outcome| {
            let _ = tx.send(outcome);
        });

        let image = rx.recv().await.unwrap().unwrap();
        assert_eq!(image.source, ImageSource::Memory);
        assert!(!slot.is_loading());
    }

    #[tokio::test]
    async fn test_delivery_ends_loading() {
        let temp_dir = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let origin = MockOrigin::gated(&gate);
        let loader = create_test_loader(temp_dir.path(), Arc::clone(&origin));
        let slot = ImageSlot::new();

        let (tx, mut rx) = mpsc::unbounded_channel();
        slot.bind(&loader, "img://slow", move |outcome| {
            let _ = tx.send(outcome);
        });
        wait_until(|| origin.calls() == 1).await;
        assert!(slot.is_loading());

        gate.add_permits(1);
        assert!(rx.recv().await.unwrap().is_ok());
        assert!(!slot.is_loading());
        assert_eq!(slot.desired_key(), Some(loader.key_for("img://slow")));
    }

    #[tokio::test]
    async fn test_failed_delivery_ends_loading() {
        let temp_dir = TempDir::new().unwrap();
        let loader = create_test_loader(temp_dir.path(), MockOrigin::failing(LoadError::Timeout));
        let slot = ImageSlot::new();

        let (tx, mut rx) = mpsc::unbounded_channel();
        slot.bind(&loader, "img://timeout", move |outcome| {
            let _ = tx.send(outcome);
        });

        assert_eq!(rx.recv().await.unwrap().unwrap_err(), LoadError::Timeout);
        assert!(!slot.is_loading());
    }
}
