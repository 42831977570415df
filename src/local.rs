//! # Local Cache Tier
//!
//! Process-local, capacity-bounded byte cache with per-entry TTLs. Expired
//! entries are removed lazily when a read or a capacity pass touches them;
//! there is no background sweep. Eviction at capacity delegates victim
//! selection to a swappable [`EvictionPolicy`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

/// A single local-tier entry: raw payload plus its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    /// Whether the entry's expiry has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// The stored payload.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The instant at which the entry expires.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Chooses which entry to drop when the local tier is at capacity.
///
/// The policy only names the victim; locking and removal stay inside the
/// cache, so policies can be swapped without touching the concurrency
/// discipline.
pub trait EvictionPolicy: Send + Sync {
    /// Returns the key of the entry to remove, or `None` to leave the store
    /// as is (the incoming entry is still inserted).
    fn choose_victim(&self, entries: &HashMap<String, CacheEntry>) -> Option<String>;
}

/// Default policy: evicts whichever entry the store yields first.
///
/// Not recency- or frequency-aware; it bounds memory and nothing more.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitraryEviction;

impl EvictionPolicy for ArbitraryEviction {
    fn choose_victim(&self, entries: &HashMap<String, CacheEntry>) -> Option<String> {
        entries.keys().next().cloned()
    }
}

/// Counter snapshot for the local tier.
#[derive(Debug, Clone, Serialize)]
pub struct LocalCacheStats {
    /// Entries currently held, expired stragglers included.
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed by capacity eviction.
    pub evictions: u64,
    /// Entries removed after their TTL passed.
    pub expired: u64,
}

pub(crate) struct LocalCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    policy: Box<dyn EvictionPolicy>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

impl LocalCache {
    /// Creates a local tier bounded to `max_entries` (0 = unbounded).
    pub(crate) fn new(max_entries: usize, policy: Box<dyn EvictionPolicy>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Returns the payload for `key`, or `None` when absent or expired.
    /// An expired entry found here is removed before reporting absence.
    pub(crate) fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Lazy expiry: re-check under the write lock, since another caller
        // may have refreshed the entry between the two lock acquisitions.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|entry| entry.is_expired()) {
            entries.remove(key);
            self.expired.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores `value` under `key`, replacing any existing entry wholesale.
    /// At capacity, expired entries are dropped first and then the policy's
    /// victim, so the store never grows past `max_entries` once the insert
    /// lands.
    pub(crate) fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut entries = self.entries.write();
        if self.max_entries > 0 && entries.len() >= self.max_entries {
            self.evict_locked(&mut entries);
        }
        entries.insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    fn evict_locked(&self, entries: &mut HashMap<String, CacheEntry>) {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        self.expired
            .fetch_add((before - entries.len()) as u64, Ordering::Relaxed);

        if entries.len() >= self.max_entries {
            if let Some(victim) = self.policy.choose_victim(entries) {
                if entries.remove(&victim).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!("local cache at capacity, evicted key: {}", victim);
                }
            }
        }
    }

    /// Removes `key` if present.
    pub(crate) fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Removes every entry whose key starts with `prefix` (plain byte-prefix
    /// match) and returns how many were removed.
    pub(crate) fn delete_by_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Removes every entry whose key contains `substring` and returns how
    /// many were removed.
    pub(crate) fn delete_by_contains(&self, substring: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.contains(substring));
        before - entries.len()
    }

    /// Drops all entries.
    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of entries currently held, expired stragglers included.
    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn stats(&self) -> LocalCacheStats {
        LocalCacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
