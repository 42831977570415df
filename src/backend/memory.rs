//! # In-Process Backend
//!
//! [`MemoryBackend`] keeps the whole key space in a concurrent map with
//! per-entry expiry, checked lazily on access. It exists for tests, doc
//! examples, and deployments where a shared store is overkill; nothing in it
//! survives the process.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::CacheBackend;
use crate::error::CacheResult;

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process implementation of the backend port.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, StoredValue>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live entries (expired ones are not counted).
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops an entry if its expiry has passed, so expired keys behave as
    /// absent everywhere without a sweeper.
    fn drop_if_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, stored| stored.is_expired());
    }
}

/// Matches the pattern forms the port defines: `prefix*`, `*substring*`,
/// `*suffix`, or an exact key. A bare `*` matches everything.
fn pattern_matches(pattern: &str, key: &str) -> bool {
    if let Some(substring) = pattern
        .strip_prefix('*')
        .and_then(|rest| rest.strip_suffix('*'))
    {
        return key.contains(substring);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return key.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return key.ends_with(suffix);
    }
    pattern == key
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.drop_if_expired(key);
        Ok(self.entries.get(key).map(|stored| stored.value.clone()))
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        let mut removed = 0;
        for key in keys {
            if self
                .entries
                .remove(key)
                .is_some_and(|(_, stored)| !stored.is_expired())
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan_keys(&self, pattern: &str, _batch_hint: u64) -> CacheResult<Vec<String>> {
        // Single linear pass; the batch hint only matters to remote stores
        // that page through their key space.
        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .filter(|entry| pattern_matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.drop_if_expired(key);
        Ok(self.entries.contains_key(key))
    }
}
