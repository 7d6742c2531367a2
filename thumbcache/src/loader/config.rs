//! Loader configuration and injectable collaborators.

use std::sync::Arc;
use std::time::Duration;

use crate::blob::Dimensions;
use crate::cache::{DiskCacheConfig, MemoryCacheConfig};
use crate::config::defaults::{DEFAULT_DECODE_MAX_DIMENSION, DEFAULT_PROBE_TIMEOUT_MS};
use crate::decode::Decoder;
use crate::fetch::{CallbackExecutor, FetchConfig};
use crate::key::KeyAlgorithm;
use crate::origin::{ConnectivityProbe, HttpOriginConfig, Origin};

/// Everything needed to build an [`ImageLoader`](super::ImageLoader).
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub memory: MemoryCacheConfig,
    pub disk: DiskCacheConfig,
    pub fetch: FetchConfig,
    /// Used when no origin is injected.
    pub http: HttpOriginConfig,
    /// Downsampling target passed to the decoder; `None` keeps full size.
    pub decode_hint: Option<Dimensions>,
    pub key_algorithm: KeyAlgorithm,
    /// `host:port` probed before each network fetch when no probe is injected.
    /// `None` treats the network as always available.
    pub probe_address: Option<String>,
    pub probe_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            memory: MemoryCacheConfig::default(),
            disk: DiskCacheConfig::default(),
            fetch: FetchConfig::default(),
            http: HttpOriginConfig::default(),
            decode_hint: Some(Dimensions::new(
                DEFAULT_DECODE_MAX_DIMENSION,
                DEFAULT_DECODE_MAX_DIMENSION,
            )),
            key_algorithm: KeyAlgorithm::default(),
            probe_address: None,
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

/// Collaborators the loader talks to through traits.
///
/// Any left as `None` is built from [`LoaderConfig`]: an
/// [`HttpOrigin`](crate::origin::HttpOrigin), a
/// [`RasterDecoder`](crate::decode::RasterDecoder), a
/// [`TcpProbe`](crate::origin::TcpProbe) or
/// [`AlwaysOnline`](crate::origin::AlwaysOnline), and an
/// [`InlineExecutor`](crate::fetch::InlineExecutor).
#[derive(Default, Clone)]
pub struct Collaborators {
    pub origin: Option<Arc<dyn Origin>>,
    pub decoder: Option<Arc<dyn Decoder>>,
    pub probe: Option<Arc<dyn ConnectivityProbe>>,
    pub executor: Option<Arc<dyn CallbackExecutor>>,
}

impl Collaborators {
    pub fn with_origin(mut self, origin: Arc<dyn Origin>) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }
}
