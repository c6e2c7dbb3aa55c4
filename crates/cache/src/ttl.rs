//! Single-namespace TTL cache with insertion-ordered eviction

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Options for one cache namespace
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Time-to-live; `Duration::ZERO` means entries never expire
    pub ttl: Duration,
    /// Maximum number of live entries
    pub capacity: usize,
}

impl CacheOptions {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self { ttl, capacity }
    }

    /// Unbounded-TTL namespace (model registry)
    pub fn unbounded(capacity: usize) -> Self {
        Self {
            ttl: Duration::ZERO,
            capacity,
        }
    }
}

/// Counters snapshot for one namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_access: Instant,
    access_count: u64,
    /// Monotonic insertion order, used for capacity eviction
    seq: u64,
}

struct Inner<V> {
    map: HashMap<String, Entry<V>>,
    next_seq: u64,
    stats: CacheStats,
}

/// Thread-safe TTL cache for one namespace
///
/// Values are cheap to clone (`Arc` in practice); `get` hands out a clone so
/// the lock is never held across caller work.
pub struct TtlCache<V> {
    /// Namespace name, used as the metrics label
    name: &'static str,
    options: CacheOptions,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, options: CacheOptions) -> Self {
        Self {
            name,
            options,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                next_seq: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Look up a key; expired entries are evicted and reported as a miss
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let expired = match inner.map.get(key) {
            None => {
                inner.stats.misses += 1;
                metrics::counter!("cache_misses_total", "namespace" => self.name).increment(1);
                return None;
            }
            Some(entry) => self.is_expired(entry.inserted_at, now),
        };

        if expired {
            inner.map.remove(key);
            inner.stats.misses += 1;
            inner.stats.expirations += 1;
            metrics::counter!("cache_expirations_total", "namespace" => self.name).increment(1);
            tracing::debug!(namespace = self.name, key, "cache entry expired");
            return None;
        }

        let entry = inner.map.get_mut(key).expect("checked above");
        entry.last_access = now;
        entry.access_count += 1;
        let value = entry.value.clone();
        inner.stats.hits += 1;
        metrics::counter!("cache_hits_total", "namespace" => self.name).increment(1);
        Some(value)
    }

    /// Insert a value, evicting the oldest-inserted entry at capacity
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if !inner.map.contains_key(&key) && inner.map.len() >= self.options.capacity {
            if let Some(oldest) = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.seq)
                .map(|(k, _)| k.clone())
            {
                inner.map.remove(&oldest);
                inner.stats.evictions += 1;
                metrics::counter!("cache_evictions_total", "namespace" => self.name).increment(1);
                tracing::debug!(namespace = self.name, key = %oldest, "evicted oldest entry");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.map.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                last_access: now,
                access_count: 0,
                seq,
            },
        );
    }

    /// Drop a key explicitly
    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.lock().map.remove(key).map(|e| e.value)
    }

    /// Number of entries, including not-yet-collected expired ones
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().map.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    fn is_expired(&self, inserted_at: Instant, now: Instant) -> bool {
        !self.options.ttl.is_zero() && now.duration_since(inserted_at) > self.options.ttl
    }
}
