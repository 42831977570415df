//! # Redis Backend
//!
//! Adapter mapping the backend port onto a shared Redis instance. Built on
//! [`ConnectionManager`], which multiplexes one auto-reconnecting connection
//! and is cheap to clone per operation.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use super::CacheBackend;
use crate::error::CacheResult;

/// Backend port implementation over Redis.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Connects to `url`, for example `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("connected cache backend to redis at {}", url);
        Ok(Self { connection })
    }

    /// Wraps an externally constructed connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        if ttl.is_zero() {
            let _: () = conn.set(key, value).await?;
        } else {
            // SET EX takes whole seconds and rejects zero, so sub-second
            // TTLs round up to one second.
            let seconds = ttl.as_secs().max(1);
            let _: () = conn.set_ex(key, value, seconds).await?;
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            // DEL with no arguments is a protocol error.
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }

    async fn scan_keys(&self, pattern: &str, batch_hint: u64) -> CacheResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(batch_hint)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        debug!("redis scan matched {} keys for pattern: {}", keys.len(), pattern);
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests need a reachable Redis; run them with
    // `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.
    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_round_trip_and_delete() {
        let backend = RedisBackend::connect(&redis_url()).await.unwrap();

        backend
            .set_bytes("tiercache-test|rt", b"payload".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(
            backend.get_bytes("tiercache-test|rt").await.unwrap(),
            Some(b"payload".to_vec())
        );
        assert!(backend.exists("tiercache-test|rt").await.unwrap());

        let removed = backend
            .delete(&["tiercache-test|rt".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(backend.get_bytes("tiercache-test|rt").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_scan_by_prefix() {
        let backend = RedisBackend::connect(&redis_url()).await.unwrap();

        for i in 0..3 {
            backend
                .set_bytes(
                    &format!("tiercache-scan|{}", i),
                    b"v".to_vec(),
                    Duration::from_secs(30),
                )
                .await
                .unwrap();
        }

        let mut keys = backend.scan_keys("tiercache-scan|*", 100).await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "tiercache-scan|0".to_string(),
                "tiercache-scan|1".to_string(),
                "tiercache-scan|2".to_string(),
            ]
        );

        backend.delete(&keys).await.unwrap();
    }
}
