//! Two-tier image cache.
//!
//! [`MemoryCache`] holds decoded images under a byte budget; [`DiskCache`]
//! persists encoded bytes across restarts. Both evict least recently used
//! entries and keep their budget after every insert.

mod disk;
mod memory;
mod stats;
mod types;

pub use disk::{DiskCache, FRAME_HEADER_LEN};
pub use memory::MemoryCache;
pub use stats::{DiskStats, MemoryStats};
pub use types::{
    default_disk_directory, ClearResult, DiskCacheConfig, MemoryCacheConfig, StorageError,
};
