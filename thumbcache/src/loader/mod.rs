//! The public image loader: memory → disk → network.
//!
//! [`ImageLoader`] owns one memory tier, one disk tier and one
//! [`FetchCoordinator`]. A memory hit is delivered immediately; anything
//! else becomes a coalesced fetch task that checks disk, then the origin,
//! and fills both tiers on the way back.
//!
//! # Example
//!
//! ```no_run
//! use thumbcache::loader::{Collaborators, ImageLoader, LoaderConfig};
//!
//! # async fn demo() -> Result<(), thumbcache::LoadError> {
//! let loader = ImageLoader::new(LoaderConfig::default(), Collaborators::default())?;
//! let image = loader.load("https://example.com/cat.jpg").await?;
//! println!("{}x{} from {}", image.blob.width(), image.blob.height(), image.source);
//! loader.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod pipeline;

pub use config::{Collaborators, LoaderConfig};

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::blob::{Dimensions, ImageBlob, ImageSource, LoadedImage};
use crate::cache::{ClearResult, DiskCache, DiskStats, MemoryCache, MemoryStats};
use crate::config::format_bytes;
use crate::decode::{Decoder, RasterDecoder};
use crate::error::LoadError;
use crate::fetch::{
    CallbackExecutor, FetchCoordinator, FetchOutcome, FetchStats, InlineExecutor, Subscription,
};
use crate::key::{derive_key_with, CacheKey, KeyAlgorithm};
use crate::origin::{AlwaysOnline, ConnectivityProbe, HttpOrigin, Origin, TcpProbe};
use pipeline::Pipeline;

/// Snapshot of every tier's statistics.
#[derive(Debug, Clone)]
pub struct LoaderStats {
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub fetch: FetchStats,
}

impl LoaderStats {
    /// Multi-line human-readable report.
    pub fn format(&self) -> String {
        let m = &self.memory;
        let d = &self.disk;
        let f = &self.fetch;
        format!(
            "Memory: {} entries, {} / {} ({:.1}% hit rate, {} evictions)\n\
             Disk:   {} entries, {} / {} ({:.1}% hit rate, {} evictions, {} write failures)\n\
             Fetch:  {} requests, {} coalesced ({:.1}%), {} completed, {} failed, {} abandoned, {} in flight",
            m.entry_count,
            format_bytes(m.size_bytes as u64),
            format_bytes(m.max_size_bytes as u64),
            m.hit_rate() * 100.0,
            m.evictions,
            d.entry_count,
            format_bytes(d.size_bytes),
            format_bytes(d.max_size_bytes),
            d.hit_rate() * 100.0,
            d.evictions,
            d.write_failures,
            f.total_requests,
            f.coalesced_requests,
            f.coalescing_ratio() * 100.0,
            f.completed,
            f.failed,
            f.abandoned,
            f.in_flight,
        )
    }
}

/// Tiered image loader.
///
/// Must be created inside a Tokio runtime. Cheap to share behind an `Arc`.
pub struct ImageLoader {
    memory: Arc<MemoryCache>,
    disk: Arc<DiskCache>,
    coordinator: FetchCoordinator,
    pipeline: Arc<Pipeline>,
    executor: Arc<dyn CallbackExecutor>,
    key_algorithm: KeyAlgorithm,
}

impl ImageLoader {
    /// Build a loader, opening the disk tier and starting the coordinator.
    pub fn new(config: LoaderConfig, collaborators: Collaborators) -> Result<Self, LoadError> {
        let memory = Arc::new(MemoryCache::new(config.memory.max_size_bytes));
        let disk = Arc::new(
            DiskCache::open(config.disk.clone()).map_err(|e| LoadError::Storage(e.to_string()))?,
        );

        let origin = match collaborators.origin {
            Some(origin) => origin,
            None => Arc::new(HttpOrigin::new(config.http.clone())?),
        };
        let decoder = collaborators
            .decoder
            .unwrap_or_else(|| Arc::new(RasterDecoder) as Arc<dyn Decoder>);
        let probe = collaborators.probe.unwrap_or_else(|| match &config.probe_address {
            Some(address) => Arc::new(TcpProbe::new(address.clone(), config.probe_timeout))
                as Arc<dyn ConnectivityProbe>,
            None => Arc::new(AlwaysOnline),
        });
        let executor = collaborators
            .executor
            .unwrap_or_else(|| Arc::new(InlineExecutor) as Arc<dyn CallbackExecutor>);

        let coordinator = FetchCoordinator::start(config.fetch.clone(), Arc::clone(&executor));

        let pipeline = Arc::new(Pipeline {
            memory: Arc::clone(&memory),
            disk: Arc::clone(&disk),
            origin,
            decoder,
            probe,
            decode_hint: config.decode_hint,
        });

        info!(
            memory_budget = config.memory.max_size_bytes,
            disk_budget = config.disk.max_size_bytes,
            disk_directory = %config.disk.directory.display(),
            disk_entries = disk.len(),
            workers = coordinator.workers(),
            key_algorithm = %config.key_algorithm,
            "Image loader ready"
        );

        Ok(Self {
            memory,
            disk,
            coordinator,
            pipeline,
            executor,
            key_algorithm: config.key_algorithm,
        })
    }

    /// Start a builder over `config` with default collaborators.
    pub fn builder(config: LoaderConfig) -> ImageLoaderBuilder {
        ImageLoaderBuilder {
            config,
            collaborators: Collaborators::default(),
        }
    }

    /// Cache key for `identifier` under this loader's key algorithm.
    pub fn key_for(&self, identifier: &str) -> CacheKey {
        derive_key_with(identifier, self.key_algorithm)
    }

    /// Resolve `identifier`, delivering the outcome to `on_result` exactly
    /// once unless the returned subscription is cancelled first.
    pub fn resolve<F>(&self, identifier: &str, on_result: F) -> Subscription
    where
        F: FnOnce(FetchOutcome) + Send + 'static,
    {
        self.resolve_with_key(self.key_for(identifier), identifier, on_result)
    }

    /// Like [`resolve`](Self::resolve) with a caller-supplied key.
    ///
    /// Identifiers sharing a key share every tier entry and in-flight fetch.
    pub fn resolve_with_key<F>(&self, key: CacheKey, identifier: &str, on_result: F) -> Subscription
    where
        F: FnOnce(FetchOutcome) + Send + 'static,
    {
        if let Some(blob) = self.memory.get(&key) {
            debug!(key = %key, "Memory hit");
            let subscription = Subscription::completed(key);
            let cancelled = subscription.cancel_flag();
            let image = LoadedImage::new(blob, ImageSource::Memory);
            self.executor.execute(Box::new(move || {
                if !cancelled.load(Ordering::Acquire) {
                    on_result(Ok(image));
                }
            }));
            return subscription;
        }

        let pipeline = Arc::clone(&self.pipeline);
        let task_key = key.clone();
        let identifier = identifier.to_string();
        self.coordinator.request(
            key,
            move || pipeline.run(task_key, identifier).boxed(),
            Box::new(on_result),
        )
    }

    /// Resolve `identifier` and wait for the outcome.
    ///
    /// Returns [`LoadError::Cancelled`] if the request is detached (by
    /// [`cancel_all`](Self::cancel_all) or [`shutdown`](Self::shutdown))
    /// before an outcome arrives. Dropping the future detaches the request.
    pub async fn load(&self, identifier: &str) -> Result<LoadedImage, LoadError> {
        let (tx, rx) = oneshot::channel();
        let subscription = self.resolve(identifier, move |outcome| {
            let _ = tx.send(outcome);
        });
        let _guard = CancelOnDrop(subscription);

        rx.await.unwrap_or(Err(LoadError::Cancelled))
    }

    /// Synchronous memory probe. Does not fetch.
    pub fn get_from_memory(&self, identifier: &str) -> Option<Arc<ImageBlob>> {
        self.memory.get(&self.key_for(identifier))
    }

    /// Drop every decoded image (memory pressure). Disk is untouched.
    pub fn evict_memory(&self) {
        let entries = self.memory.len();
        self.memory.evict_all();
        info!(entries, "Memory tier evicted");
    }

    /// Clear memory and disk.
    pub async fn clear(&self) -> Result<ClearResult, LoadError> {
        self.memory.evict_all();
        let disk = Arc::clone(&self.disk);
        let result = tokio::task::spawn_blocking(move || disk.clear())
            .await
            .map_err(|e| LoadError::Internal(format!("disk clear task failed: {}", e)))?
            .map_err(|e| LoadError::Storage(e.to_string()))?;
        info!(
            entries_removed = result.entries_removed,
            bytes_freed = result.bytes_freed,
            "Cache cleared"
        );
        Ok(result)
    }

    /// Detach every pending listener. Running fetches still fill the tiers.
    pub fn cancel_all(&self) -> usize {
        self.coordinator.cancel_all()
    }

    /// Stop the coordinator and wait for running fetches.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        self.coordinator.log_stats();
    }

    pub fn stats(&self) -> LoaderStats {
        LoaderStats {
            memory: self.memory.stats(),
            disk: self.disk.stats(),
            fetch: self.coordinator.stats(),
        }
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight_count(&self) -> usize {
        self.coordinator.in_flight_count()
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    pub fn decode_hint(&self) -> Option<Dimensions> {
        self.pipeline.decode_hint
    }
}

/// Builder for [`ImageLoader`] with injectable collaborators.
pub struct ImageLoaderBuilder {
    config: LoaderConfig,
    collaborators: Collaborators,
}

impl ImageLoaderBuilder {
    pub fn origin(mut self, origin: Arc<dyn Origin>) -> Self {
        self.collaborators = self.collaborators.with_origin(origin);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.collaborators = self.collaborators.with_decoder(decoder);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.collaborators = self.collaborators.with_probe(probe);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.collaborators = self.collaborators.with_executor(executor);
        self
    }

    pub fn build(self) -> Result<ImageLoader, LoadError> {
        ImageLoader::new(self.config, self.collaborators)
    }
}

struct CancelOnDrop(Subscription);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
