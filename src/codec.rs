//! # Value Codec
//!
//! JSON encoding between typed values and the byte payloads both tiers
//! store. Failures carry the cache key so callers can tell which entry held
//! the malformed payload.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, CacheResult};

/// Encodes a value into the payload stored under `key`.
pub(crate) fn encode<T: Serialize>(key: &str, value: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|err| CacheError::Encode {
        key: key.to_string(),
        message: err.to_string(),
    })
}

/// Decodes the payload stored under `key` back into a typed value.
pub(crate) fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(bytes).map_err(|err| CacheError::Decode {
        key: key.to_string(),
        message: err.to_string(),
    })
}
