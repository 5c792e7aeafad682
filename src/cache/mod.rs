//! Bounded caching for netverify.
//!
//! [`Cache`] is a generic concurrent map with least-recently-used eviction
//! and hit/miss metrics. [`CommandCache`] specializes it for device command
//! output keyed by `(session identity, command)`.
//!
//! Recency is a monotonically increasing access tick, not wall-clock time.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

pub mod command;

pub use command::{CommandCache, CommandKey};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries; 0 disables the cache
    pub max_entries: usize,
    /// Enable cache hit/miss metrics
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 128,
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self::with_capacity(0)
    }
}

/// Cache metrics for monitoring and diagnostics
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Number of cache hits
    pub hits: AtomicU64,
    /// Number of cache misses
    pub misses: AtomicU64,
    /// Number of LRU evictions
    pub evictions: AtomicU64,
    /// Number of explicit invalidations
    pub invalidations: AtomicU64,
    /// Current number of entries
    pub entries: AtomicUsize,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    /// Get summary as a string
    pub fn summary(&self) -> String {
        format!(
            "Hits: {}, Misses: {}, Hit Rate: {:.2}%, Entries: {}, Evictions: {}, Invalidations: {}",
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.hit_rate() * 100.0,
            self.entries.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
            self.invalidations.load(Ordering::Relaxed),
        )
    }
}

/// A cached entry with metadata
#[derive(Debug)]
pub struct CacheEntry<T> {
    /// The cached value
    pub value: T,
    /// Tick of the most recent read or write
    pub last_access: AtomicU64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, tick: u64) -> Self {
        Self {
            value,
            last_access: AtomicU64::new(tick),
        }
    }

    pub fn record_access(&self, tick: u64) {
        self.last_access.store(tick, Ordering::Relaxed);
    }
}

/// A generic concurrent LRU cache implementation using DashMap
pub struct Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    entries: DashMap<K, CacheEntry<V>>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
    clock: AtomicU64,
    // Serializes insert + evict so the entry count never exceeds the bound
    write_lock: Mutex<()>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::with_capacity(config.max_entries.min(1024)),
            metrics: Arc::new(CacheMetrics::new()),
            config,
            clock: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Whether values are stored at all
    pub fn is_enabled(&self) -> bool {
        self.config.max_entries > 0
    }

    pub fn capacity(&self) -> usize {
        self.config.max_entries
    }

    /// Get a value from the cache, marking it as most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.entries.get(key).map(|entry| {
            entry.record_access(self.tick());
            entry.value.clone()
        });

        if self.config.enable_metrics {
            match found {
                Some(_) => self.metrics.record_hit(),
                None => self.metrics.record_miss(),
            }
        }
        found
    }

    /// Insert or replace a value, evicting the least recently used entry when full
    pub fn insert(&self, key: K, value: V) {
        if !self.is_enabled() {
            return;
        }

        let _guard = self.write_lock.lock();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.evict_lru();
        }

        self.entries.insert(key, CacheEntry::new(value, self.tick()));
        self.metrics.entries.store(self.entries.len(), Ordering::Relaxed);
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        let count = self.entries.len();
        self.entries.clear();
        self.metrics.entries.store(0, Ordering::Relaxed);
        if self.config.enable_metrics {
            self.metrics
                .invalidations
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Evict least recently used entry
    fn evict_lru(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_access.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() && self.config.enable_metrics {
                self.metrics.record_eviction();
            }
        }
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.config.max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic_operations() {
        let cache: Cache<String, String> = Cache::new(CacheConfig::default());

        cache.insert("key1".to_string(), "value1".to_string());
        assert_eq!(cache.get(&"key1".to_string()), Some("value1".to_string()));
        assert_eq!(cache.get(&"nonexistent".to_string()), None);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"key1".to_string()), None);
        assert_eq!(cache.metrics().invalidations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cache_metrics() {
        let cache: Cache<String, String> = Cache::new(CacheConfig::default());
        cache.insert("key1".to_string(), "value1".to_string());

        cache.get(&"key1".to_string());
        cache.get(&"nonexistent".to_string());

        let metrics = cache.metrics();
        assert_eq!(metrics.hits.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.misses.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.hit_rate(), 0.5);
    }

    #[test]
    fn test_cache_lru_eviction() {
        let cache: Cache<String, String> = Cache::new(CacheConfig::with_capacity(3));

        cache.insert("key1".to_string(), "value1".to_string());
        cache.insert("key2".to_string(), "value2".to_string());
        cache.insert("key3".to_string(), "value3".to_string());

        // key1 becomes most recently used, key2 is now the oldest
        cache.get(&"key1".to_string());
        cache.insert("key4".to_string(), "value4".to_string());

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains_key(&"key2".to_string()));
        assert!(cache.contains_key(&"key1".to_string()));
        assert!(cache.contains_key(&"key3".to_string()));
        assert!(cache.contains_key(&"key4".to_string()));
        assert_eq!(cache.metrics().evictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_replacing_does_not_evict() {
        let cache: Cache<u32, u32> = Cache::new(CacheConfig::with_capacity(2));
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.insert(2, 20);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), Some(1));
        assert_eq!(cache.get(&2), Some(20));
    }

    #[test]
    fn test_disabled_cache() {
        let cache: Cache<String, String> = Cache::new(CacheConfig::disabled());
        cache.insert("key1".to_string(), "value1".to_string());

        assert!(cache.is_empty());
        assert_eq!(cache.get(&"key1".to_string()), None);
        assert_eq!(cache.metrics().misses.load(Ordering::Relaxed), 1);
    }
}
