//! # Cache Manager
//!
//! Orchestrates the two cache tiers: a process-local byte cache in front of
//! a shared backend store. Reads go local first and fall through to the
//! backend, writes go through both, and `get_or_set` coalesces concurrent
//! computations for the same key so an expensive miss is computed once per
//! process.
//!
//! The manager is cheap to clone; clones share the same tiers, in-flight
//! registry, and lifecycle state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::CacheBackend;
use crate::coalesce::{Admission, FlightGroup, FlightOutcome};
use crate::codec;
use crate::error::{CacheError, CacheResult};
use crate::keys::{build_key_from_conditions, KeyPart};
use crate::local::{ArbitraryEviction, EvictionPolicy, LocalCache, LocalCacheStats};

/// Configuration for [`CacheManager`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend TTL applied when an operation does not supply its own.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Whether the process-local tier is enabled.
    pub local_enabled: bool,
    /// Expiry for local-tier entries, independent of the backend TTL.
    #[serde(with = "humantime_serde")]
    pub local_ttl: Duration,
    /// Local-tier capacity bound; 0 means unbounded.
    pub local_max_entries: usize,
    /// Batch size hint used when scanning backend keys for bulk operations.
    pub scan_batch: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            local_enabled: true,
            local_ttl: Duration::from_secs(60),
            local_max_entries: 1000,
            scan_batch: 100,
        }
    }
}

impl CacheConfig {
    fn validate(&self) -> CacheResult<()> {
        if self.default_ttl.is_zero() {
            return Err(CacheError::configuration("default_ttl must be positive"));
        }
        if self.scan_batch == 0 {
            return Err(CacheError::configuration("scan_batch must be positive"));
        }
        if self.local_enabled && self.local_ttl.is_zero() {
            return Err(CacheError::configuration(
                "local_ttl must be positive when the local tier is enabled",
            ));
        }
        Ok(())
    }
}

/// Counter snapshot across both tiers.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Lookups answered by either tier.
    pub hits: u64,
    /// Lookups answered by neither tier.
    pub misses: u64,
    pub hit_ratio: f64,
    pub sets: u64,
    pub deletes: u64,
    /// Local-tier counters, `None` when the tier is disabled.
    pub local: Option<LocalCacheStats>,
}

#[derive(Debug, Default)]
struct ManagerStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

/// Two-tier cache front: a process-local TTL cache over a shared backend.
///
/// Constructed once by the application's composition root and shared from
/// there; there is no global instance.
#[derive(Clone)]
pub struct CacheManager {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    local: Option<Arc<LocalCache>>,
    flights: Arc<FlightGroup>,
    closed: Arc<RwLock<bool>>,
    stats: Arc<ManagerStats>,
}

impl CacheManager {
    /// Creates a manager over `backend` with the default eviction policy.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> CacheResult<Self> {
        Self::with_eviction_policy(backend, config, Box::new(ArbitraryEviction))
    }

    /// Creates a manager whose local tier evicts through `policy`.
    pub fn with_eviction_policy(
        backend: Arc<dyn CacheBackend>,
        config: CacheConfig,
        policy: Box<dyn EvictionPolicy>,
    ) -> CacheResult<Self> {
        config.validate()?;
        let local = config
            .local_enabled
            .then(|| Arc::new(LocalCache::new(config.local_max_entries, policy)));
        info!(
            "cache manager initialized, local tier {}",
            if local.is_some() { "enabled" } else { "disabled" }
        );
        Ok(Self {
            config,
            backend,
            local,
            flights: Arc::new(FlightGroup::new()),
            closed: Arc::new(RwLock::new(false)),
            stats: Arc::new(ManagerStats::default()),
        })
    }

    /// Fetches `key` and decodes it into `T`.
    ///
    /// Absence in both tiers is reported as [`CacheError::Miss`], which is
    /// the expected branchable condition, not a failure. A backend hit
    /// repopulates the local tier before decoding.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        self.get_with(key, true).await
    }

    /// Encodes `value` and writes it through the backend, then the local
    /// tier. `ttl` overrides the configured default for the backend write;
    /// the local tier always uses its own TTL. A backend failure aborts
    /// before the local write.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        self.set_with(key, value, ttl, true).await
    }

    /// The cache-aside primitive with stampede protection.
    ///
    /// Tries `get` first; on a miss, concurrent callers for the same key
    /// coalesce into one flight whose leader re-checks both tiers, runs
    /// `compute` once, and writes the result through on success. Every
    /// member of the flight receives the same outcome, success or error,
    /// and nothing is cached on error so the next call retries.
    ///
    /// The computation runs in a detached task: cancelling one caller
    /// (dropping its future) abandons only that caller's wait, never the
    /// computation other waiters depend on.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CacheResult<T>> + Send + 'static,
    {
        self.get_or_set_with(key, ttl, true, compute).await
    }

    /// Removes `key` from the local tier, then from the backend.
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.check_open()?;
        if let Some(local) = &self.local {
            local.delete(key);
        }
        self.backend.delete(&[key.to_string()]).await?;
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Removes every key starting with `prefix` from the local tier, then
    /// scans the backend for matching keys and deletes them.
    ///
    /// The scan is live and best-effort: keys written concurrently while it
    /// runs may survive, and keys already removed stay removed even if a
    /// later step fails.
    pub async fn delete_by_prefix(&self, prefix: &str) -> CacheResult<()> {
        self.check_open()?;
        if let Some(local) = &self.local {
            let removed = local.delete_by_prefix(prefix);
            if removed > 0 {
                debug!("removed {} local entries with prefix: {}", removed, prefix);
            }
        }
        self.delete_scanned(&format!("{}*", prefix)).await
    }

    /// Removes every key containing `substring`, local tier first, then the
    /// backend by scan. Same best-effort semantics as
    /// [`CacheManager::delete_by_prefix`].
    pub async fn delete_by_contains(&self, substring: &str) -> CacheResult<()> {
        self.check_open()?;
        if let Some(local) = &self.local {
            let removed = local.delete_by_contains(substring);
            if removed > 0 {
                debug!(
                    "removed {} local entries containing: {}",
                    removed, substring
                );
            }
        }
        self.delete_scanned(&format!("*{}*", substring)).await
    }

    /// Applies [`CacheManager::delete_by_prefix`] to each prefix
    /// independently. Failures are collected into one
    /// [`CacheError::Bulk`] instead of aborting, so later prefixes still
    /// get processed.
    pub async fn delete_by_prefixes(&self, prefixes: &[String]) -> CacheResult<()> {
        self.check_open()?;
        let mut failures = Vec::new();
        for prefix in prefixes {
            if let Err(err) = self.delete_by_prefix(prefix).await {
                warn!("failed to delete keys with prefix {}: {}", prefix, err);
                failures.push(err);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Bulk(failures))
        }
    }

    /// Applies [`CacheManager::delete_by_contains`] to each substring
    /// independently, collecting failures like
    /// [`CacheManager::delete_by_prefixes`].
    pub async fn delete_by_contains_list(&self, substrings: &[String]) -> CacheResult<()> {
        self.check_open()?;
        let mut failures = Vec::new();
        for substring in substrings {
            if let Err(err) = self.delete_by_contains(substring).await {
                warn!("failed to delete keys containing {}: {}", substring, err);
                failures.push(err);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Bulk(failures))
        }
    }

    /// Deletes the exact key built from `prefix` and `conds` with
    /// [`build_key_from_conditions`].
    pub async fn delete_by_conds(
        &self,
        prefix: &str,
        conds: &HashMap<String, KeyPart>,
    ) -> CacheResult<()> {
        self.delete(&build_key_from_conditions(prefix, conds)).await
    }

    /// Prefix-deletes everything under the key built from `prefix` and
    /// `conds`.
    pub async fn delete_by_conds_prefix(
        &self,
        prefix: &str,
        conds: &HashMap<String, KeyPart>,
    ) -> CacheResult<()> {
        self.delete_by_prefix(&build_key_from_conditions(prefix, conds))
            .await
    }

    /// Contains-deletes each serialized condition map in `conds_list`,
    /// collecting failures into one [`CacheError::Bulk`].
    pub async fn delete_by_conds_list(
        &self,
        prefix: &str,
        conds_list: &[HashMap<String, KeyPart>],
    ) -> CacheResult<()> {
        let substrings: Vec<String> = conds_list
            .iter()
            .map(|conds| build_key_from_conditions(prefix, conds))
            .collect();
        self.delete_by_contains_list(&substrings).await
    }

    /// Whether `key` exists in either tier. A live local entry is
    /// authoritative; otherwise the backend answers.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.exists_with(key, true).await
    }

    /// Lists backend keys starting with `prefix`.
    pub async fn get_keys_by_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        self.check_open()?;
        self.backend
            .scan_keys(&format!("{}*", prefix), self.config.scan_batch)
            .await
    }

    /// Lists backend keys containing `substring`.
    pub async fn get_keys_by_contains(&self, substring: &str) -> CacheResult<Vec<String>> {
        self.check_open()?;
        self.backend
            .scan_keys(&format!("*{}*", substring), self.config.scan_batch)
            .await
    }

    /// Closes the manager: clears the local tier and rejects every further
    /// operation with [`CacheError::Closed`]. Idempotent; repeat calls are
    /// no-ops.
    pub fn close(&self) {
        let mut closed = self.closed.write();
        if *closed {
            return;
        }
        if let Some(local) = &self.local {
            local.clear();
        }
        *closed = true;
        info!("cache manager closed");
    }

    /// Counter snapshot. Still readable after `close`.
    pub fn stats(&self) -> CacheStats {
        let hits = self.stats.hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_ratio: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
            sets: self.stats.sets.load(Ordering::Relaxed),
            deletes: self.stats.deletes.load(Ordering::Relaxed),
            local: self.local.as_ref().map(|local| local.stats()),
        }
    }

    pub(crate) fn check_open(&self) -> CacheResult<()> {
        if *self.closed.read() {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) async fn get_with<T: DeserializeOwned>(
        &self,
        key: &str,
        use_local: bool,
    ) -> CacheResult<T> {
        self.check_open()?;
        match self.fetch_bytes(key, use_local).await? {
            Some(bytes) => codec::decode(key, &bytes),
            None => Err(CacheError::Miss),
        }
    }

    pub(crate) async fn set_with<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        use_local: bool,
    ) -> CacheResult<()> {
        self.check_open()?;
        let encoded = codec::encode(key, value)?;
        self.store_bytes(key, encoded, ttl, use_local).await
    }

    pub(crate) async fn exists_with(&self, key: &str, use_local: bool) -> CacheResult<bool> {
        self.check_open()?;
        if use_local {
            if let Some(local) = &self.local {
                if local.get(key).is_some() {
                    return Ok(true);
                }
            }
        }
        self.backend.exists(key).await
    }

    pub(crate) async fn get_or_set_with<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        use_local: bool,
        compute: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CacheResult<T>> + Send + 'static,
    {
        self.check_open()?;
        match self.get_with::<T>(key, use_local).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_miss() => {}
            Err(err) => return Err(err),
        }

        match self.flights.join(key) {
            Admission::Waiter(waiter) => {
                debug!("joined in-flight computation for key: {}", key);
                let bytes = waiter.wait().await?;
                codec::decode(key, &bytes)
            }
            Admission::Leader(publisher) => {
                // The flight runs detached so it survives this caller's
                // cancellation; waiters only depend on the publisher.
                let manager = self.clone();
                let flight_key = key.to_string();
                let flight = tokio::spawn(async move {
                    let outcome = manager
                        .run_flight(&flight_key, ttl, use_local, compute)
                        .await;
                    manager
                        .flights
                        .finish(&flight_key, publisher, outcome.clone());
                    outcome
                });
                let bytes = match flight.await {
                    Ok(outcome) => outcome?,
                    Err(err) => {
                        return Err(CacheError::compute(format!(
                            "computation task failed: {}",
                            err
                        )))
                    }
                };
                codec::decode(key, &bytes)
            }
        }
    }

    /// Leader body of one flight: re-check both tiers, compute, store.
    async fn run_flight<T, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        use_local: bool,
        compute: F,
    ) -> FlightOutcome
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        // Another process may have populated the backend between the
        // caller's miss and this flight starting.
        self.check_open()?;
        if let Some(bytes) = self.fetch_bytes(key, use_local).await? {
            return Ok(bytes);
        }

        debug!("computing value for key: {}", key);
        let value = compute().await?;
        let encoded = codec::encode(key, &value)?;

        self.check_open()?;
        self.store_bytes(key, encoded.clone(), ttl, use_local)
            .await?;
        Ok(encoded)
    }

    /// Raw read path: local tier first, then the backend, repopulating the
    /// local tier on a backend hit.
    async fn fetch_bytes(&self, key: &str, use_local: bool) -> CacheResult<Option<Vec<u8>>> {
        if use_local {
            if let Some(local) = &self.local {
                if let Some(bytes) = local.get(key) {
                    debug!("local cache hit for key: {}", key);
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(bytes));
                }
            }
        }

        match self.backend.get_bytes(key).await? {
            Some(bytes) => {
                debug!("backend cache hit for key: {}", key);
                if use_local {
                    if let Some(local) = &self.local {
                        local.set(key, bytes.clone(), self.config.local_ttl);
                    }
                }
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(bytes))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Raw write path: backend first, local tier after. A backend failure
    /// leaves the local tier untouched.
    async fn store_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        ttl: Option<Duration>,
        use_local: bool,
    ) -> CacheResult<()> {
        let remote_ttl = ttl.unwrap_or(self.config.default_ttl);
        self.backend.set_bytes(key, bytes.clone(), remote_ttl).await?;
        if use_local {
            if let Some(local) = &self.local {
                local.set(key, bytes, self.config.local_ttl);
            }
        }
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Scans the backend for `pattern` and deletes whatever matched.
    async fn delete_scanned(&self, pattern: &str) -> CacheResult<()> {
        let keys = self
            .backend
            .scan_keys(pattern, self.config.scan_batch)
            .await?;
        if keys.is_empty() {
            return Ok(());
        }
        let removed = self.backend.delete(&keys).await?;
        debug!(
            "deleted {} backend keys matching pattern: {}",
            removed, pattern
        );
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
