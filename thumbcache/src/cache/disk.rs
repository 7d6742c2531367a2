//! Persistent cache of encoded image bytes.
//!
//! # File Layout
//!
//! One file per entry in a flat directory:
//! ```text
//! {directory}/{key}.img                  committed entry
//! {directory}/{key}.{pid}.{seq}.tmp      write in progress
//! ```
//!
//! Each committed file is a frame: an 8-byte magic followed by the payload
//! length as a little-endian `u64`, then the payload. A file whose frame
//! does not validate is deleted and reported as a miss.
//!
//! # Atomicity
//!
//! Writes go to a temp file unique to the writer, are flushed with
//! `sync_all`, then renamed over the committed path. Readers therefore see
//! either the previous value or the new one, never a mix. Leftover temp
//! files from an interrupted process are removed by [`DiskCache::open`].
//!
//! # Eviction
//!
//! An in-memory LRU index (seeded from file mtimes on open) tracks every
//! committed entry. After each write, least recently used entries are
//! removed until the total is within budget. Reads refresh both the index
//! and the file mtime so recency survives a restart.
//!
//! All methods block; async callers run them on `spawn_blocking`.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::stats::DiskStats;
use crate::cache::types::{ClearResult, DiskCacheConfig, StorageError};
use crate::key::{CacheKey, ENTRY_EXTENSION};

/// Frame magic for committed entries.
const FRAME_MAGIC: &[u8; 8] = b"THMBC\x00\x01\x00";

/// Magic plus little-endian payload length.
pub const FRAME_HEADER_LEN: usize = 16;

const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    size: u64,
    tick: u64,
}

/// LRU index over committed entries.
#[derive(Debug, Default)]
struct DiskIndex {
    entries: HashMap<CacheKey, IndexEntry>,
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    total_size: u64,
    stats: DiskStats,
}

impl DiskIndex {
    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn upsert(&mut self, key: CacheKey, size: u64) {
        self.remove(&key);
        let tick = self.bump();
        self.recency.insert(tick, key.clone());
        self.entries.insert(key, IndexEntry { size, tick });
        self.total_size += size;
    }

    fn touch(&mut self, key: &CacheKey) {
        let tick = self.bump();
        if let Some(entry) = self.entries.get_mut(key) {
            let old = std::mem::replace(&mut entry.tick, tick);
            self.recency.remove(&old);
            self.recency.insert(tick, key.clone());
        }
    }

    fn remove(&mut self, key: &CacheKey) -> Option<IndexEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        self.total_size -= entry.size;
        Some(entry)
    }

    fn pop_oldest(&mut self) -> Option<(CacheKey, IndexEntry)> {
        let (_, key) = self.recency.pop_first()?;
        let entry = self.entries.remove(&key)?;
        self.total_size -= entry.size;
        Some((key, entry))
    }

    fn sync_stats(&mut self) {
        let (size, count) = (self.total_size, self.entries.len());
        self.stats.update_size(size, count);
    }
}

/// Bounded on-disk cache with atomic commits and LRU eviction.
pub struct DiskCache {
    directory: PathBuf,
    max_size_bytes: u64,
    index: Mutex<DiskIndex>,
    temp_seq: AtomicU64,
}

impl DiskCache {
    /// Open (or create) a disk cache rooted at `config.directory`.
    ///
    /// Removes temp files left by interrupted writes, rebuilds the LRU index
    /// from file mtimes, and evicts if the existing content is over budget.
    pub fn open(config: DiskCacheConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.directory)
            .map_err(|e| StorageError::io(&config.directory, e))?;

        let mut found: Vec<(CacheKey, SystemTime, u64)> = Vec::new();
        let mut temp_removed = 0usize;

        let entries =
            fs::read_dir(&config.directory).map_err(|e| StorageError::io(&config.directory, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
                match fs::remove_file(&path) {
                    Ok(()) => temp_removed += 1,
                    Err(e) => debug!(path = %path.display(), error = %e, "Failed to remove stale temp file"),
                }
            } else if let Some(key) = CacheKey::from_file_name(name) {
                let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                found.push((key, mtime, metadata.len()));
            }
        }

        // Oldest first so ticks follow mtime order
        found.sort_by_key(|(_, mtime, _)| *mtime);

        let mut index = DiskIndex {
            stats: DiskStats {
                max_size_bytes: config.max_size_bytes,
                ..Default::default()
            },
            ..Default::default()
        };
        for (key, _, size) in found {
            index.upsert(key, size);
        }

        let cache = Self {
            directory: config.directory,
            max_size_bytes: config.max_size_bytes,
            index: Mutex::new(index),
            temp_seq: AtomicU64::new(0),
        };

        let evicted = cache.evict_if_over_budget();
        let (entries, size) = {
            let index = cache.index.lock();
            (index.entries.len(), index.total_size)
        };

        info!(
            dir = %cache.directory.display(),
            entries,
            size_bytes = size,
            max_bytes = cache.max_size_bytes,
            temp_removed,
            evicted,
            "Disk cache opened"
        );

        Ok(cache)
    }

    /// Read the committed bytes for `key`.
    ///
    /// Returns `None` if the entry is absent, unreadable or corrupt. Corrupt
    /// entries are deleted.
    pub fn read(&self, key: &CacheKey) -> Option<Bytes> {
        let path = self.entry_path(key);

        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Disk cache read failed");
                }
                let mut index = self.index.lock();
                if e.kind() == ErrorKind::NotFound && index.remove(key).is_some() {
                    index.sync_stats();
                }
                index.stats.record_miss();
                return None;
            }
        };

        let mut index = self.index.lock();
        match decode_frame(raw) {
            Some(payload) => {
                index.touch(key);
                index.stats.record_hit();
                drop(index);
                touch_mtime(&path);
                Some(payload)
            }
            None => {
                // A writer may have committed a good frame since our read
                let still_corrupt = fs::read(&path).map(|raw| decode_frame(raw).is_none());
                if matches!(still_corrupt, Ok(true)) {
                    if let Err(e) = fs::remove_file(&path) {
                        debug!(path = %path.display(), error = %e, "Failed to delete corrupt entry");
                    }
                    index.remove(key);
                    index.stats.record_corrupt();
                    index.sync_stats();
                    warn!(key = %key, "Discarded corrupt disk cache entry");
                }
                index.stats.record_miss();
                None
            }
        }
    }

    /// Atomically write `data` as the committed value for `key`, then evict
    /// least recently used entries until within budget.
    ///
    /// On failure the previous committed value is left untouched and no
    /// temp file remains.
    pub fn write(&self, key: &CacheKey, data: &[u8]) -> Result<(), StorageError> {
        let frame_len = (FRAME_HEADER_LEN + data.len()) as u64;
        if frame_len > self.max_size_bytes {
            self.index.lock().stats.record_write_failure();
            return Err(StorageError::EntryTooLarge {
                size: frame_len,
                max: self.max_size_bytes,
            });
        }

        let temp_path = self.temp_path(key);
        if let Err(e) = write_frame(&temp_path, data) {
            let _ = fs::remove_file(&temp_path);
            self.index.lock().stats.record_write_failure();
            return Err(e);
        }

        let path = self.entry_path(key);
        let mut index = self.index.lock();
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            index.stats.record_write_failure();
            return Err(StorageError::io(&path, e));
        }

        index.upsert(key.clone(), frame_len);
        index.stats.record_write();
        let evicted = self.evict_locked(&mut index);
        index.sync_stats();

        debug!(
            key = %key,
            size_bytes = frame_len,
            evicted,
            total_bytes = index.total_size,
            "Disk cache entry committed"
        );
        Ok(())
    }

    /// Remove least recently used entries until the total is within budget.
    ///
    /// Returns the number of entries removed.
    pub fn evict_if_over_budget(&self) -> usize {
        let mut index = self.index.lock();
        let evicted = self.evict_locked(&mut index);
        index.sync_stats();
        evicted
    }

    fn evict_locked(&self, index: &mut DiskIndex) -> usize {
        let mut evicted = 0usize;
        let mut bytes_freed = 0u64;

        while index.total_size > self.max_size_bytes {
            let Some((key, entry)) = index.pop_oldest() else {
                break;
            };
            let path = self.entry_path(&key);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Failed to delete evicted entry");
                }
            }
            evicted += 1;
            bytes_freed += entry.size;
        }

        if evicted > 0 {
            index.stats.record_eviction(evicted as u64);
            debug!(
                evicted,
                bytes_freed,
                total_bytes = index.total_size,
                "Disk cache evicted least recently used entries"
            );
        }
        evicted
    }

    /// Remove every committed entry.
    pub fn clear(&self) -> Result<ClearResult, StorageError> {
        let mut index = self.index.lock();
        let mut result = ClearResult::default();

        let entries =
            fs::read_dir(&self.directory).map_err(|e| StorageError::io(&self.directory, e))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_entry = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(CacheKey::from_file_name)
                .is_some();
            if !is_entry {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            fs::remove_file(&path).map_err(|e| StorageError::io(&path, e))?;
            result.entries_removed += 1;
            result.bytes_freed += size;
        }

        index.entries.clear();
        index.recency.clear();
        index.total_size = 0;
        index.sync_stats();

        info!(
            entries_removed = result.entries_removed,
            bytes_freed = result.bytes_freed,
            "Disk cache cleared"
        );
        Ok(result)
    }

    /// Check the index for a committed entry without reading it.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.index.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of committed entries, frame headers included.
    pub fn size_bytes(&self) -> u64 {
        self.index.lock().total_size
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn stats(&self) -> DiskStats {
        self.index.lock().stats.clone()
    }

    /// Record a failed write that happened outside this tier (e.g. a
    /// cancelled blocking task).
    pub fn record_write_failure(&self) {
        self.index.lock().stats.record_write_failure();
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.file_name())
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.directory.join(format!(
            "{}.{}.{}.{}",
            key,
            std::process::id(),
            seq,
            TEMP_EXTENSION
        ))
    }
}

fn write_frame(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = File::create(path).map_err(|e| StorageError::io(path, e))?;
    file.write_all(FRAME_MAGIC)
        .and_then(|_| file.write_all(&(data.len() as u64).to_le_bytes()))
        .and_then(|_| file.write_all(data))
        .and_then(|_| file.sync_all())
        .map_err(|e| StorageError::io(path, e))
}

fn decode_frame(raw: Vec<u8>) -> Option<Bytes> {
    if raw.len() < FRAME_HEADER_LEN || &raw[..8] != FRAME_MAGIC {
        return None;
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&raw[8..FRAME_HEADER_LEN]);
    let len = u64::from_le_bytes(len);
    if len != (raw.len() - FRAME_HEADER_LEN) as u64 {
        return None;
    }
    Some(Bytes::from(raw).slice(FRAME_HEADER_LEN..))
}

/// Refresh the mtime so recency survives a restart. Best effort.
fn touch_mtime(path: &Path) {
    if let Ok(file) = File::options().write(true).open(path) {
        let _ = file.set_modified(SystemTime::now());
    }
}
