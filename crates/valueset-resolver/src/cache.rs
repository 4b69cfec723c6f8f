//! Adjacency caching for hierarchy expansion.
//!
//! Provides an LRU cache with TTL expiration for per-vocabulary adjacency
//! maps, so several is-a filters over one vocabulary share a single bulk
//! edge query. The cache lives inside one resolver and dies with it.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::expander::Adjacency;

/// A cached adjacency with expiration tracking.
#[derive(Debug, Clone)]
struct CacheEntry {
    adjacency: Arc<Adjacency>,
    created_at: Instant,
}

impl CacheEntry {
    fn new(adjacency: Arc<Adjacency>) -> Self {
        Self {
            adjacency,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Thread-safe LRU cache of adjacency maps keyed by vocabulary.
///
/// # Features
///
/// - **LRU Eviction**: When the cache is full, the least recently used vocabulary is evicted.
/// - **TTL Expiration**: Entries expire after the configured time-to-live.
/// - **Thread-Safe**: Uses a `parking_lot::Mutex` around the LRU.
pub struct AdjacencyCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl AdjacencyCache {
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_capacity(config.max_entries, config.ttl)
    }

    /// Creates a cache with custom capacity and TTL.
    pub fn with_capacity(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Gets the adjacency of a vocabulary if cached and not expired.
    ///
    /// On a hit the entry is promoted to most-recently-used.
    pub fn get(&self, vocabulary: &str) -> Option<Arc<Adjacency>> {
        let mut cache = self.inner.lock();

        if let Some(entry) = cache.get(vocabulary) {
            if entry.is_expired(self.ttl) {
                cache.pop(vocabulary);
            } else {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.adjacency));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores the adjacency of a vocabulary, evicting the LRU entry if full.
    pub fn set(&self, vocabulary: String, adjacency: Arc<Adjacency>) {
        self.inner.lock().put(vocabulary, CacheEntry::new(adjacency));
    }

    /// Checks if a vocabulary is cached (without affecting LRU order).
    ///
    /// Expiration is not checked.
    pub fn contains(&self, vocabulary: &str) -> bool {
        self.inner.lock().contains(vocabulary)
    }

    /// Number of cached vocabularies, possibly including expired ones.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Removes expired entries.
    pub fn cleanup_expired(&self) {
        let mut cache = self.inner.lock();
        let ttl = self.ttl;
        let expired: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            cache.pop(&key);
        }
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let cache = self.inner.lock();
        let total = cache.len();
        let expired = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl))
            .count();

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            valid_entries: total.saturating_sub(expired),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for AdjacencyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("AdjacencyCache")
            .field("entries", &stats.total_entries)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Statistics about the cache state.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Total number of entries in the cache.
    pub total_entries: usize,
    /// Number of expired entries (not yet cleaned up).
    pub expired_entries: usize,
    /// Number of valid (non-expired) entries.
    pub valid_entries: usize,
    /// Lookups answered from the cache.
    pub hits: usize,
    /// Lookups that fell through to the store.
    pub misses: usize,
}

impl CacheStats {
    /// Returns the hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}
