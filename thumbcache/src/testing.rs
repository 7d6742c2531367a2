//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::Semaphore;

use crate::blob::{Dimensions, ImageBlob};
use crate::cache::{DiskCacheConfig, MemoryCacheConfig};
use crate::decode::Decoder;
use crate::error::LoadError;
use crate::fetch::FetchConfig;
use crate::loader::{ImageLoader, LoaderConfig};
use crate::origin::{ConnectivityProbe, Origin};

/// Origin serving the identifier's bytes, optionally held behind a gate.
pub(crate) struct MockOrigin {
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    failure: Option<LoadError>,
}

impl MockOrigin {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
            failure: None,
        })
    }

    pub(crate) fn gated(gate: &Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Some(Arc::clone(gate)),
            failure: None,
        })
    }

    pub(crate) fn failing(error: LoadError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: None,
            failure: Some(error),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Origin for MockOrigin {
    fn fetch<'a>(&'a self, identifier: &'a str) -> BoxFuture<'a, Result<Bytes, LoadError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            match &self.failure {
                Some(e) => Err(e.clone()),
                None => Ok(Bytes::copy_from_slice(identifier.as_bytes())),
            }
        }
        .boxed()
    }
}

/// Decodes any payload into a 2x2 image filled with its last byte.
/// Payloads starting with `bad` fail.
pub(crate) struct StubDecoder;

impl Decoder for StubDecoder {
    fn decode(&self, bytes: &[u8], _hint: Option<Dimensions>) -> Result<ImageBlob, LoadError> {
        if bytes.starts_with(b"bad") {
            return Err(LoadError::Decode("unsupported format".to_string()));
        }
        let fill = bytes.last().copied().unwrap_or(0);
        ImageBlob::from_rgba(2, 2, vec![fill; 16])
            .ok_or_else(|| LoadError::Decode("bad dimensions".to_string()))
    }
}

pub(crate) struct Offline;

impl ConnectivityProbe for Offline {
    fn is_network_available(&self) -> BoxFuture<'_, bool> {
        futures::future::ready(false).boxed()
    }
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Loader config with 1 MB tiers rooted at `dir` and no downsampling.
pub(crate) fn create_test_config(dir: &Path) -> LoaderConfig {
    LoaderConfig {
        memory: MemoryCacheConfig {
            max_size_bytes: 1024 * 1024,
        },
        disk: DiskCacheConfig::new(dir, 1024 * 1024),
        fetch: FetchConfig { workers: 4 },
        decode_hint: None,
        ..LoaderConfig::default()
    }
}

pub(crate) fn create_test_loader(dir: &Path, origin: Arc<MockOrigin>) -> ImageLoader {
    ImageLoader::builder(create_test_config(dir))
        .origin(origin)
        .decoder(Arc::new(StubDecoder))
        .build()
        .unwrap()
}
