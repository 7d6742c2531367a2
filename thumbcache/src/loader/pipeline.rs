//! The work performed by one fetch task.
//!
//! ```text
//! disk ──hit──► decode ──► memory ──► Disk
//!   │
//!  miss
//!   ▼
//! probe ──► origin ──► decode ──► disk write ──► memory ──► Network
//! ```
//!
//! Disk I/O and decoding run on the blocking pool. A disk write failure is
//! logged and counted but never fails the fetch. Any other failure leaves
//! both tiers untouched.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::blob::{Dimensions, ImageBlob, ImageSource, LoadedImage};
use crate::cache::{DiskCache, MemoryCache};
use crate::decode::Decoder;
use crate::error::LoadError;
use crate::fetch::FetchOutcome;
use crate::key::CacheKey;
use crate::origin::{ConnectivityProbe, Origin};

/// Shared handles used by every fetch task.
pub(super) struct Pipeline {
    pub(super) memory: Arc<MemoryCache>,
    pub(super) disk: Arc<DiskCache>,
    pub(super) origin: Arc<dyn Origin>,
    pub(super) decoder: Arc<dyn Decoder>,
    pub(super) probe: Arc<dyn ConnectivityProbe>,
    pub(super) decode_hint: Option<Dimensions>,
}

impl Pipeline {
    /// Resolve `key` from disk, falling back to the origin.
    pub(super) async fn run(self: Arc<Self>, key: CacheKey, identifier: String) -> FetchOutcome {
        if let Some(bytes) = self.read_disk(&key).await? {
            match self.decode(bytes).await {
                Ok(blob) => {
                    self.memory.put(key.clone(), Arc::clone(&blob));
                    debug!(key = %key, size_bytes = blob.size_bytes(), "Promoted disk entry to memory");
                    return Ok(LoadedImage::new(blob, ImageSource::Disk));
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Disk entry failed to decode, refetching");
                }
            }
        }

        if !self.probe.is_network_available().await {
            debug!(key = %key, "Network unavailable, failing fast");
            return Err(LoadError::NoConnectivity);
        }

        let bytes = self.origin.fetch(&identifier).await?;
        debug!(key = %key, bytes = bytes.len(), "Fetched from origin");

        let blob = self.decode(bytes.clone()).await?;
        self.write_disk(&key, bytes).await;
        self.memory.put(key, Arc::clone(&blob));

        Ok(LoadedImage::new(blob, ImageSource::Network))
    }

    async fn read_disk(&self, key: &CacheKey) -> Result<Option<Bytes>, LoadError> {
        let disk = Arc::clone(&self.disk);
        let key = key.clone();
        tokio::task::spawn_blocking(move || disk.read(&key))
            .await
            .map_err(|e| join_error("disk read", e))
    }

    async fn decode(&self, bytes: Bytes) -> Result<Arc<ImageBlob>, LoadError> {
        let decoder = Arc::clone(&self.decoder);
        let hint = self.decode_hint;
        tokio::task::spawn_blocking(move || decoder.decode(&bytes, hint))
            .await
            .map_err(|e| join_error("decode", e))?
            .map(Arc::new)
    }

    async fn write_disk(&self, key: &CacheKey, bytes: Bytes) {
        let disk = Arc::clone(&self.disk);
        let task_key = key.clone();
        let result = tokio::task::spawn_blocking(move || disk.write(&task_key, &bytes)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Disk cache write failed, serving from memory only");
            }
            Err(e) => {
                self.disk.record_write_failure();
                warn!(key = %key, error = %e, "Disk cache write task failed");
            }
        }
    }
}

fn join_error(stage: &str, e: JoinError) -> LoadError {
    LoadError::Internal(format!("{} task failed: {}", stage, e))
}
