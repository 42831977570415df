//! # tiercache
//!
//! A two-tier caching library: a process-local TTL cache in front of a
//! shared key/value backend, with request coalescing and deterministic
//! key construction.
//!
//! ## Features
//!
//! - **Two tiers, one surface**: reads check the local tier first and fall
//!   through to the backend; backend hits repopulate the local tier, writes
//!   go through both.
//! - **Request coalescing**: concurrent `get_or_set` calls for the same key
//!   run the computation once per process and share the outcome, including
//!   errors. The computation survives caller cancellation.
//! - **Deterministic keys**: [`build_key`] and [`build_key_from_conditions`]
//!   normalize heterogeneous values into stable, order-independent key
//!   strings safe to share across services.
//! - **Pluggable backends**: anything implementing [`CacheBackend`] plugs in;
//!   [`MemoryBackend`] and [`RedisBackend`] ship in the box.
//!
//! ## Example
//!
//! ```
//! # use std::sync::Arc;
//! use tiercache::{CacheConfig, CacheManager, MemoryBackend};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tiercache::CacheResult<()> {
//! let manager = CacheManager::new(Arc::new(MemoryBackend::new()), CacheConfig::default())?;
//!
//! manager.set("user|42", &"alice".to_string(), None).await?;
//! let name: String = manager.get("user|42").await?;
//! assert_eq!(name, "alice");
//!
//! // Expensive reads coalesce: concurrent callers share one computation.
//! let count: u64 = manager
//!     .get_or_set("user|42|logins", None, || async { Ok(7) })
//!     .await?;
//! assert_eq!(count, 7);
//! # Ok(())
//! # }
//! ```

/// Backend port and the bundled adapters (in-memory, Redis).
pub mod backend;

/// Error taxonomy shared by every cache operation.
pub mod error;

/// Deterministic key normalization and construction.
pub mod keys;

/// Process-local TTL tier with pluggable capacity eviction.
pub mod local;

/// The two-tier orchestrator and its configuration.
pub mod manager;

/// Typed per-key handles over the manager.
pub mod typed;

mod coalesce;
mod codec;

pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use error::{CacheError, CacheResult};
pub use keys::{build_key, build_key_from_conditions, normalize, serialize_conditions, KeyPart};
pub use local::{ArbitraryEviction, CacheEntry, EvictionPolicy, LocalCacheStats};
pub use manager::{CacheConfig, CacheManager, CacheStats};
pub use typed::Typed;
