//! # Cache Backend Port
//!
//! The narrow interface to the shared key/value store backing the remote
//! tier. The manager consumes the store exclusively through this trait;
//! persistence and transport are the implementation's concern.
//!
//! Two implementations ship with the crate:
//! - [`MemoryBackend`]: in-process store for tests, examples, and
//!   single-process deployments.
//! - [`RedisBackend`]: adapter over a shared Redis instance.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

/// Shared key/value store operations the manager delegates to.
///
/// Contract notes:
/// - Absence is not an error: `get_bytes` returns `Ok(None)` for a missing
///   key and the manager decides what a miss means.
/// - A zero `ttl` stores without expiry.
/// - `delete` accepts an empty key list and reports how many keys it
///   actually removed.
/// - `scan_keys` patterns are `prefix*`, `*substring*`, `*suffix`, or an
///   exact key; `batch_hint` sizes scan rounds and is not a result limit.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetches the payload stored under `key`, `None` when absent.
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` with the given expiry.
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Removes the given keys, returning the number actually deleted.
    async fn delete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Lists every key matching `pattern`.
    async fn scan_keys(&self, pattern: &str, batch_hint: u64) -> CacheResult<Vec<String>>;

    /// Whether `key` currently exists.
    async fn exists(&self, key: &str) -> CacheResult<bool>;
}
