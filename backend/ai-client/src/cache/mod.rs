//! Time-to-live response cache for AI results.
//!
//! Entries are keyed by a canonical serialization of the operation and its
//! parameters (see [`CacheKey`]). The cache itself is a plain `&mut self`
//! structure; the service owns it behind a lock and runs [`ResponseCache::evict`]
//! on a timer.

mod key;

pub use key::CacheKey;

use crate::config::CacheConfig;

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, trace};
use tokio::time::Instant;

/// Outcome of a cache lookup.
///
/// `Miss` and `Expired` both count as misses; they are kept apart so callers
/// can report them as different events.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<V> {
    Hit(V),
    Miss,
    Expired,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    stored_at: Instant,
    ttl: Duration,
    /// Insertion order, breaks ties between entries stored at the same instant.
    sequence: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    /// `hits / (hits + misses)`, 0.0 before any lookup.
    pub hit_rate: f64,
    pub oldest_entry: Option<Instant>,
    pub newest_entry: Option<Instant>,
}

#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    default_ttl: Duration,
    max_entries: usize,
    hits: u64,
    misses: u64,
    next_sequence: u64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            max_entries,
            hits: 0,
            misses: 0,
            next_sequence: 0,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up `key`, deleting it if its ttl has passed.
    pub fn get(&mut self, key: &CacheKey) -> CacheLookup<V> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                trace!("Cache miss for {key}");
                return CacheLookup::Miss;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.entries.remove(key);
            self.misses += 1;
            debug!("Cache entry expired for {key}");
            return CacheLookup::Expired;
        }

        self.hits += 1;
        trace!("Cache hit for {key}");
        match self.entries.get(key) {
            Some(entry) => CacheLookup::Hit(entry.data.clone()),
            None => CacheLookup::Miss,
        }
    }

    /// Store `data` under `key`, replacing any previous entry.
    pub fn set(&mut self, key: CacheKey, data: V, ttl: Option<Duration>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
                sequence,
            },
        );
    }

    /// Fresh data for `key` without touching the hit/miss counters or
    /// removing anything.
    pub fn peek(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.data.clone())
    }

    /// Drop expired entries, then the oldest ones until at most `max_entries` remain.
    ///
    /// Returns the number of entries removed.
    pub fn evict(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();

        self.entries.retain(|_, entry| !entry.is_expired(now));
        let expired = before - self.entries.len();

        let mut overflow = 0;
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;

            let mut by_age: Vec<(Instant, u64, CacheKey)> = self
                .entries
                .iter()
                .map(|(key, entry)| (entry.stored_at, entry.sequence, key.clone()))
                .collect();
            by_age.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

            for (_, _, key) in by_age.into_iter().take(excess) {
                self.entries.remove(&key);
                overflow += 1;
            }
        }

        if expired + overflow > 0 {
            debug!(
                "Cache eviction removed {expired} expired and {overflow} overflow entries, {} remain",
                self.entries.len()
            );
        }

        expired + overflow
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        };

        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
            hit_rate,
            oldest_entry: self.entries.values().map(|e| e.stored_at).min(),
            newest_entry: self.entries.values().map(|e| e.stored_at).max(),
        }
    }
}
