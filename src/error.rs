//! # Cache Errors
//!
//! Error taxonomy for both cache tiers and the operations that span them.
//! The enum is `Clone` so the outcome of one coalesced computation can be
//! handed to every caller that joined it.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by cache operations.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Invalid configuration rejected at construction time.
    #[error("invalid cache configuration: {message}")]
    Configuration { message: String },

    /// The manager has been closed; no further operations are accepted.
    #[error("cache manager is closed")]
    Closed,

    /// The key is present in neither tier. Expected and branchable, not a
    /// failure: callers test for it with [`CacheError::is_miss`].
    #[error("cache miss")]
    Miss,

    /// A value could not be encoded for storage.
    #[error("encode failed for key '{key}': {message}")]
    Encode { key: String, message: String },

    /// Stored bytes could not be decoded into the requested type.
    #[error("decode failed for key '{key}': {message}")]
    Decode { key: String, message: String },

    /// The backend store reported a failure.
    #[error("cache backend error: {message}")]
    Backend { message: String },

    /// A `get_or_set` computation failed or its task was aborted.
    #[error("cache computation failed: {message}")]
    Compute { message: String },

    /// Failures collected across a bulk operation. The operation kept going
    /// after each failure, so the list covers every input that failed.
    #[error("bulk cache operation failed: {}", summarize(.0))]
    Bulk(Vec<CacheError>),
}

impl CacheError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
        }
    }

    /// Creates a backend error from any displayable failure.
    pub fn backend(message: impl Into<String>) -> Self {
        CacheError::Backend {
            message: message.into(),
        }
    }

    /// Creates a computation error, for wrapping failures inside a
    /// `get_or_set` compute closure.
    pub fn compute(message: impl Into<String>) -> Self {
        CacheError::Compute {
            message: message.into(),
        }
    }

    /// Whether this error is the expected "key not found" condition.
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }

    /// Whether this error was caused by operating a closed manager.
    pub fn is_closed(&self) -> bool {
        matches!(self, CacheError::Closed)
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend {
            message: err.to_string(),
        }
    }
}

fn summarize(errors: &[CacheError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
