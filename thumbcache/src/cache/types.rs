//! Configuration, results and errors for the cache tiers.

use crate::config::defaults::{DEFAULT_DISK_CACHE_SIZE, DEFAULT_MEMORY_CACHE_SIZE};
use std::path::PathBuf;
use thiserror::Error;

/// Disk tier errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry is larger than the whole disk budget.
    #[error("entry of {size} bytes exceeds disk cache budget of {max} bytes")]
    EntryTooLarge { size: u64, max: u64 },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Memory tier configuration.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Budget for decoded images in bytes.
    pub max_size_bytes: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MEMORY_CACHE_SIZE,
        }
    }
}

/// Disk tier configuration.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Storage root holding one file per entry.
    pub directory: PathBuf,
    /// Budget for committed entries in bytes, frame headers included.
    pub max_size_bytes: u64,
}

impl DiskCacheConfig {
    pub fn new(directory: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        Self {
            directory: directory.into(),
            max_size_bytes,
        }
    }
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            directory: default_disk_directory(),
            max_size_bytes: DEFAULT_DISK_CACHE_SIZE,
        }
    }
}

/// Default storage root: `<platform cache dir>/thumbcache/thumbnails`.
pub fn default_disk_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("thumbcache")
        .join("thumbnails")
}

/// Outcome of clearing the disk tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearResult {
    pub entries_removed: usize,
    pub bytes_freed: u64,
}
