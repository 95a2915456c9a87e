//! Asset cache with LRU eviction and a fixed entry capacity
//!
//! **Why**: repeated submissions for the same identifier must complete
//! synchronously without re-fetching. Capacity is bounded by entry count;
//! the least-recently-used asset is evicted first.
//!
//! **Used by**: Loader (hit fast path, insert-on-success), diagnostics.
//!
//! Guarded by its own mutex, independent of the scheduler lock. Each call is
//! atomic; `put` performs evict+insert as one operation.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use log::debug;
use lru::LruCache;

use crate::asset::Asset;

/// Fallback capacity when a caller passes zero.
const DEFAULT_CAPACITY: usize = 100;

/// Key→asset map with LRU eviction.
#[derive(Debug)]
pub struct AssetCache {
    inner: Mutex<LruCache<String, Asset>>,
}

impl AssetCache {
    /// Create a cache holding at most `capacity` assets.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .unwrap_or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// O(1) lookup; a hit promotes the key to most-recently-used.
    pub fn get(&self, key: &str) -> Option<Asset> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    /// Insert or replace, promoting the key. At capacity the current LRU
    /// entry is evicted first.
    pub fn put(&self, key: &str, asset: Asset) {
        let mut cache = self.inner.lock().unwrap();
        if let Some((old_key, _)) = cache.push(key.to_string(), asset) {
            if old_key != key {
                debug!("cache full, evicted lru entry: {}", old_key);
            }
        }
    }

    /// Membership check without touching the access order.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().unwrap().peek(key).is_some()
    }

    /// Number of cached assets.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(byte: u8) -> Asset {
        Asset::new(vec![byte])
    }

    /// Test: basic get/put/contains
    /// Validates: hit returns the stored asset, contains does not promote
    #[test]
    fn test_cache_basic() {
        let cache = AssetCache::new(4);
        assert!(cache.get("a").is_none());

        cache.put("a", asset(1));
        assert!(cache.contains("a"));
        assert_eq!(cache.get("a").unwrap().bytes(), &[1]);
        assert_eq!(cache.len(), 1);
    }

    /// Test: capacity bound
    /// Validates: the cache never holds more than its capacity
    #[test]
    fn test_cache_never_exceeds_capacity() {
        let cache = AssetCache::new(3);
        for i in 0..10u8 {
            cache.put(&format!("k{}", i), asset(i));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    /// Test: LRU eviction order
    /// Validates: the evicted entry is the least-recently-accessed one
    #[test]
    fn test_cache_lru_trace() {
        let cache = AssetCache::new(3);
        cache.put("a", asset(1));
        cache.put("b", asset(2));
        cache.put("c", asset(3));

        // Touch "a": access order is now b < c < a
        assert!(cache.get("a").is_some());

        // Overflow evicts "b", the LRU entry
        cache.put("d", asset(4));
        assert!(!cache.contains("b"));
        assert!(cache.contains("a"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));

        // Touch "c", then overflow again: "a" is now LRU
        assert!(cache.get("c").is_some());
        cache.put("e", asset(5));
        assert!(!cache.contains("a"));
        assert_eq!(cache.len(), 3);
    }

    /// Test: replacement
    /// Validates: re-putting an existing key replaces the value and promotes
    #[test]
    fn test_cache_replace_promotes() {
        let cache = AssetCache::new(2);
        cache.put("a", asset(1));
        cache.put("b", asset(2));

        // Replace "a" - promotes it, so the next overflow evicts "b"
        cache.put("a", asset(9));
        cache.put("c", asset(3));

        assert_eq!(cache.get("a").unwrap().bytes(), &[9]);
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    /// Test: zero capacity falls back to the default
    /// Validates: construction never panics
    #[test]
    fn test_cache_zero_capacity() {
        let cache = AssetCache::new(0);
        cache.put("a", asset(1));
        assert!(cache.contains("a"));
    }
}
