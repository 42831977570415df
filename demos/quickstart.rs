//! # Quickstart Example
//!
//! This example walks through the crate's surface: two-tier reads and
//! writes, coalesced `get_or_set` under concurrent load, typed handles,
//! condition-based invalidation, and the stats snapshot.
//!
//! Run it with `cargo run --example quickstart`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tiercache::{
    build_key_from_conditions, CacheConfig, CacheManager, CacheResult, KeyPart, MemoryBackend,
};
use tracing::info;

#[tokio::main]
async fn main() -> CacheResult<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let manager = CacheManager::new(Arc::new(MemoryBackend::new()), CacheConfig::default())?;

    // Plain round trip: write-through both tiers, read back from the
    // local one.
    manager.set("user|42|name", &"alice".to_string(), None).await?;
    let name: String = manager.get("user|42|name").await?;
    info!("round trip: {}", name);

    // Eight concurrent callers miss the same key; the computation runs
    // once and every caller gets its value.
    let computations = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        let computations = computations.clone();
        handles.push(tokio::spawn(async move {
            manager
                .get_or_set::<u64, _, _>("report|daily", None, move || async move {
                    computations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(1024)
                })
                .await
        }));
    }
    for handle in handles {
        let total = handle.await.unwrap_or(Err(tiercache::CacheError::compute(
            "caller task failed",
        )))?;
        assert_eq!(total, 1024);
    }
    info!(
        "coalescing: 8 callers, {} computation(s)",
        computations.load(Ordering::SeqCst)
    );

    // Typed handle: the key and type are bound once, options ride along.
    let session = manager
        .typed::<Vec<String>>("user|42|roles")
        .ttl(Duration::from_secs(30));
    session.set(&vec!["admin".to_string(), "auditor".to_string()]).await?;
    info!("typed read: {:?}", session.get().await?);

    // Condition maps build deterministic keys, so invalidation can target
    // exactly the entries a query would have produced.
    let mut conds = HashMap::new();
    conds.insert("tenant".to_string(), KeyPart::from(7));
    conds.insert("status".to_string(), KeyPart::from("active"));
    let key = build_key_from_conditions("accounts", &conds);
    manager.set(&key, &3u32, None).await?;
    manager.delete_by_conds("accounts", &conds).await?;
    info!("conditional key {} deleted: {}", key, !manager.exists(&key).await?);

    let stats = manager.stats();
    info!(
        "stats: {} hits / {} misses (ratio {:.2}), local entries: {}",
        stats.hits,
        stats.misses,
        stats.hit_ratio,
        stats.local.map(|local| local.entries).unwrap_or(0)
    );

    manager.close();
    Ok(())
}
