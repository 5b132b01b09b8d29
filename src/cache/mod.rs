//! LRU cache of kernel entries for a training batch
//!
//! Entries are keyed by the positions of the two samples in the batch.
//! Kernels are symmetric, so `(i, j)` and `(j, i)` share one slot.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Bytes charged per cached entry: two indices, the value and list links
const BYTES_PER_ENTRY: usize = 48;

/// Position pair with `i <= j`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey {
    i: usize,
    j: usize,
}

impl PairKey {
    fn new(i: usize, j: usize) -> Self {
        Self {
            i: i.min(j),
            j: i.max(j),
        }
    }
}

/// LRU cache for kernel values of one training batch
pub struct KernelCache {
    entries: LruCache<PairKey, f64>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Cache sized to roughly `memory_bytes` of storage
    pub fn with_memory_limit(memory_bytes: usize) -> Self {
        Self::new(memory_bytes / BYTES_PER_ENTRY)
    }

    /// Cached value for `(i, j)`, if present
    pub fn get(&mut self, i: usize, j: usize) -> Option<f64> {
        let value = self.entries.get(&PairKey::new(i, j)).copied();
        match value {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        value
    }

    pub fn put(&mut self, i: usize, j: usize, value: f64) {
        self.entries.put(PairKey::new(i, j), value);
    }

    /// Cached value for `(i, j)`, computing and storing it on a miss
    pub fn get_or_compute<F>(&mut self, i: usize, j: usize, compute: F) -> f64
    where
        F: FnOnce() -> f64,
    {
        if let Some(value) = self.get(i, j) {
            return value;
        }
        let value = compute();
        self.put(i, j, value);
        value
    }

    /// Fraction of lookups answered from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.entries.cap().get(),
            size: self.entries.len(),
        }
    }

    /// Drop all entries and reset the counters
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Hit/miss counters and occupancy of a [`KernelCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}
