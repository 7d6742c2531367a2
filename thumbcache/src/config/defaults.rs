//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use super::settings::*;
use crate::cache::default_disk_directory;
use crate::key::KeyAlgorithm;

// =============================================================================
// Cache
// =============================================================================

/// Memory budget for decoded images (64 MB).
pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// Disk budget for encoded images (50 MB).
pub const DEFAULT_DISK_CACHE_SIZE: u64 = 50 * 1024 * 1024;

// =============================================================================
// Fetch
// =============================================================================

/// Worker pool size.
pub const DEFAULT_FETCH_WORKERS: usize = 5;

/// Upper bound accepted for `[fetch] workers`.
pub const MAX_FETCH_WORKERS: usize = 256;

/// Whole-request timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

/// Connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default User-Agent string for HTTP requests.
pub const DEFAULT_USER_AGENT: &str = concat!("thumbcache/", env!("CARGO_PKG_VERSION"));

/// Timeout for the TCP connectivity probe in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1500;

// =============================================================================
// Decode
// =============================================================================

/// Decoded images are downsampled toward this size; 0 disables downsampling.
pub const DEFAULT_DECODE_MAX_DIMENSION: u32 = 512;

// =============================================================================
// Logging
// =============================================================================

/// Log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "thumbcache.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            cache: CacheSettings {
                directory: default_disk_directory(),
                memory_size: DEFAULT_MEMORY_CACHE_SIZE,
                disk_size: DEFAULT_DISK_CACHE_SIZE,
            },
            fetch: FetchSettings {
                workers: DEFAULT_FETCH_WORKERS,
                timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
                connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                probe_address: None,
            },
            decode: DecodeSettings {
                max_width: DEFAULT_DECODE_MAX_DIMENSION,
                max_height: DEFAULT_DECODE_MAX_DIMENSION,
            },
            keys: KeySettings {
                algorithm: KeyAlgorithm::default(),
            },
            catalog: CatalogSettings { url: None },
            logging: LoggingSettings {
                directory: config_dir.join("logs"),
            },
        }
    }
}
