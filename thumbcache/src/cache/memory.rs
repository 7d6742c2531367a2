//! In-memory cache of decoded images with strict LRU eviction.

use crate::blob::ImageBlob;
use crate::cache::stats::MemoryStats;
use crate::key::CacheKey;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Entry in the memory cache.
#[derive(Debug)]
struct CacheEntry {
    blob: Arc<ImageBlob>,
    /// Recency stamp; larger is more recent.
    tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Recency order, oldest first.
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    size_bytes: usize,
    stats: MemoryStats,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        self.size_bytes -= entry.blob.size_bytes();
        Some(entry)
    }

    fn sync_size(&mut self) {
        let (size, count) = (self.size_bytes, self.entries.len());
        self.stats.update_size(size, count);
    }
}

/// Bounded, size-weighted cache of decoded images.
///
/// The sum of cached blob sizes never exceeds `max_size_bytes` once a call
/// returns. Eviction is strict least-recently-used: both `get` hits and
/// `put` mark an entry as most recent.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size_bytes: usize,
}

impl MemoryCache {
    /// Create a new memory cache with the given budget in bytes.
    pub fn new(max_size_bytes: usize) -> Self {
        let inner = Inner {
            stats: MemoryStats {
                max_size_bytes,
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            inner: Mutex::new(inner),
            max_size_bytes,
        }
    }

    /// Look up a decoded image, marking it most recently used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<ImageBlob>> {
        let mut inner = self.inner.lock();
        let tick = inner.bump();

        let Some(entry) = inner.entries.get_mut(key) else {
            inner.stats.record_miss();
            return None;
        };
        let old_tick = std::mem::replace(&mut entry.tick, tick);
        let blob = Arc::clone(&entry.blob);

        inner.recency.remove(&old_tick);
        inner.recency.insert(tick, key.clone());
        inner.stats.record_hit();
        Some(blob)
    }

    /// Insert or replace an image, then evict least recently used entries
    /// until the cache fits its budget.
    ///
    /// The entry just inserted is never evicted to make room for itself. A
    /// blob larger than the whole budget is not retained, and any previous
    /// value for `key` is dropped.
    pub fn put(&self, key: CacheKey, blob: Arc<ImageBlob>) {
        let size = blob.size_bytes();
        let mut inner = self.inner.lock();

        inner.remove(&key);

        if size > self.max_size_bytes {
            inner.stats.rejected += 1;
            inner.sync_size();
            debug!(
                key = %key,
                size_bytes = size,
                max_size_bytes = self.max_size_bytes,
                "Image exceeds memory budget, not cached"
            );
            return;
        }

        let tick = inner.bump();
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key.clone(), CacheEntry { blob, tick });
        inner.size_bytes += size;
        inner.stats.insertions += 1;

        let mut evicted = 0u64;
        while inner.size_bytes > self.max_size_bytes {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            if oldest == key {
                // Unreachable while size <= budget, kept so the loop always ends.
                inner.recency.insert(tick, oldest);
                break;
            }
            if let Some(entry) = inner.entries.remove(&oldest) {
                inner.size_bytes -= entry.blob.size_bytes();
                evicted += 1;
            }
        }

        if evicted > 0 {
            inner.stats.record_eviction(evicted);
            debug!(
                evicted,
                size_bytes = inner.size_bytes,
                "Memory cache evicted least recently used entries"
            );
        }
        inner.sync_size();
    }

    /// Remove every entry at once.
    pub fn evict_all(&self) {
        let mut inner = self.inner.lock();
        let count = inner.entries.len() as u64;
        inner.entries.clear();
        inner.recency.clear();
        inner.size_bytes = 0;
        inner.stats.record_eviction(count);
        inner.sync_size();
    }

    /// Check if a key exists without touching recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current sum of cached blob sizes.
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().size_bytes
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn stats(&self) -> MemoryStats {
        self.inner.lock().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::derive_key;
    use proptest::prelude::*;

    fn create_test_key(n: u32) -> CacheKey {
        derive_key(&format!("https://img.example.com/thumbs/0/{}.jpg", n))
    }

    /// Blob whose footprint is exactly `size` bytes (rounded down to a pixel).
    fn create_test_blob(size: usize) -> Arc<ImageBlob> {
        let pixels = size / 4;
        Arc::new(ImageBlob::from_rgba(pixels as u32, 1, vec![0u8; pixels * 4]).unwrap())
    }

    #[test]
    fn test_memory_cache_new() {
        let cache = MemoryCache::new(1_000_000);
        assert_eq!(cache.max_size_bytes(), 1_000_000);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.size_bytes(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_memory_cache_put_and_get() {
        let cache = MemoryCache::new(1_000_000);
        let key = create_test_key(1);
        let blob = create_test_blob(400);

        cache.put(key.clone(), Arc::clone(&blob));

        let retrieved = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&retrieved, &blob));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_memory_cache_miss() {
        let cache = MemoryCache::new(1_000_000);
        assert!(cache.get(&create_test_key(1)).is_none());
    }

    #[test]
    fn test_memory_cache_size_tracking() {
        let cache = MemoryCache::new(1_000_000);
        cache.put(create_test_key(1), create_test_blob(1000));
        assert_eq!(cache.size_bytes(), 1000);

        cache.put(create_test_key(2), create_test_blob(2000));
        assert_eq!(cache.size_bytes(), 3000);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_memory_cache_evict_all() {
        let cache = MemoryCache::new(1_000_000);
        let key = create_test_key(1);
        cache.put(key.clone(), create_test_blob(100));

        cache.evict_all();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.size_bytes(), 0);
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_memory_cache_lru_eviction() {
        // Holds two 1000-byte entries
        let cache = MemoryCache::new(2500);

        cache.put(create_test_key(1), create_test_blob(1000));
        cache.put(create_test_key(2), create_test_blob(1000));
        cache.put(create_test_key(3), create_test_blob(1000));

        assert!(!cache.contains(&create_test_key(1)), "Oldest entry should be evicted");
        assert!(cache.contains(&create_test_key(2)));
        assert!(cache.contains(&create_test_key(3)));
        assert!(cache.size_bytes() <= 2500);
    }

    #[test]
    fn test_memory_cache_access_updates_lru() {
        let cache = MemoryCache::new(2500);
        let key1 = create_test_key(1);
        let key2 = create_test_key(2);
        let key3 = create_test_key(3);

        cache.put(key1.clone(), create_test_blob(1000));
        cache.put(key2.clone(), create_test_blob(1000));
        cache.get(&key1);
        cache.put(key3.clone(), create_test_blob(1000));

        assert!(cache.contains(&key1), "Accessed entry should remain");
        assert!(!cache.contains(&key2), "Least recently used entry should be evicted");
        assert!(cache.contains(&key3));
    }

    #[test]
    fn test_memory_cache_budget_scenario() {
        // Budget 10 KiB: 4 KiB A, 4 KiB B, then 4 KiB C evicts A.
        let cache = MemoryCache::new(10 * 1024);
        let (a, b, c) = (create_test_key(1), create_test_key(2), create_test_key(3));

        cache.put(a.clone(), create_test_blob(4096));
        cache.put(b.clone(), create_test_blob(4096));
        cache.put(c.clone(), create_test_blob(4096));

        assert!(!cache.contains(&a));
        assert!(cache.contains(&b));
        assert!(cache.contains(&c));
        assert_eq!(cache.size_bytes(), 8192);
    }

    #[test]
    fn test_memory_cache_oversize_blob_not_retained() {
        let cache = MemoryCache::new(1000);
        let key = create_test_key(1);
        let other = create_test_key(2);

        cache.put(other.clone(), create_test_blob(400));
        cache.put(key.clone(), create_test_blob(400));
        cache.put(key.clone(), create_test_blob(4000));

        assert!(!cache.contains(&key), "Oversize replacement drops old value");
        assert!(cache.contains(&other), "Unrelated entries are untouched");
        assert_eq!(cache.size_bytes(), 400);
        assert_eq!(cache.stats().rejected, 1);
    }

    #[test]
    fn test_memory_cache_replace_existing() {
        let cache = MemoryCache::new(1_000_000);
        let key = create_test_key(1);

        cache.put(key.clone(), create_test_blob(100));
        let replacement = create_test_blob(200);
        cache.put(key.clone(), Arc::clone(&replacement));

        assert!(Arc::ptr_eq(&cache.get(&key).unwrap(), &replacement));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 200);
    }

    #[test]
    fn test_memory_cache_statistics() {
        let cache = MemoryCache::new(1500);
        let key = create_test_key(1);

        cache.get(&key);
        cache.put(key.clone(), create_test_blob(1000));
        cache.get(&key);
        cache.get(&key);
        cache.put(create_test_key(2), create_test_blob(1000));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 2);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.size_bytes, 1000);
        assert_eq!(stats.max_size_bytes, 1500);
    }

    #[test]
    fn test_memory_cache_concurrent_access() {
        let cache = Arc::new(MemoryCache::new(64 * 1024));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = create_test_key(t * 1000 + i % 50);
                        if cache.get(&key).is_none() {
                            cache.put(key, create_test_blob(1024));
                        }
                        assert!(cache.size_bytes() <= 64 * 1024);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.size_bytes() <= cache.max_size_bytes());
    }

    proptest! {
        #[test]
        fn prop_budget_holds_after_every_put(
            budget in 0usize..20_000,
            ops in prop::collection::vec((0u32..16, 0usize..8_000, any::<bool>()), 1..64),
        ) {
            let cache = MemoryCache::new(budget);
            for (id, size, read) in ops {
                let key = create_test_key(id);
                if read {
                    cache.get(&key);
                } else {
                    let blob = create_test_blob(size);
                    let blob_size = blob.size_bytes();
                    cache.put(key.clone(), blob);
                    prop_assert_eq!(cache.contains(&key), blob_size <= budget);
                }
                prop_assert!(cache.size_bytes() <= budget);
            }
        }
    }
}
