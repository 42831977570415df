//! # Cache Benchmarks
//!
//! Benchmarks for the hot paths: key construction and tiered reads,
//! using the Criterion benchmarking framework.
//!
//! ## Running Benchmarks
//! ```bash
//! cargo bench --bench cache_benchmarks
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;
use std::sync::Arc;
use tiercache::{
    build_key, build_key_from_conditions, CacheConfig, CacheManager, KeyPart, MemoryBackend,
};
use tokio::runtime::Runtime;

/// Create a manager over an in-memory backend, pre-warmed with one key.
fn create_bench_manager(rt: &Runtime) -> CacheManager {
    let manager =
        CacheManager::new(Arc::new(MemoryBackend::new()), CacheConfig::default()).unwrap();
    rt.block_on(async {
        manager
            .set("bench|hot", &"payload".to_string(), None)
            .await
            .unwrap();
    });
    manager
}

/// Benchmark deterministic key construction
fn bench_key_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_construction");

    group.bench_function("mixed_parts", |b| {
        b.iter(|| {
            black_box(build_key(
                "user",
                &[
                    KeyPart::from(42i64),
                    KeyPart::from("profile"),
                    KeyPart::from(true),
                    KeyPart::from(vec![KeyPart::from(1), KeyPart::from(2)]),
                ],
            ))
        })
    });

    for size in [2usize, 4, 8] {
        let mut conds = HashMap::new();
        for i in 0..size {
            conds.insert(format!("field_{}", i), KeyPart::from(i as i64));
        }
        group.bench_with_input(
            BenchmarkId::new("condition_map", size),
            &conds,
            |b, conds| b.iter(|| black_box(build_key_from_conditions("query", conds))),
        );
    }

    group.finish();
}

/// Benchmark reads against each tier
fn bench_cache_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = create_bench_manager(&rt);

    let mut group = c.benchmark_group("cache_reads");

    group.bench_function("local_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(manager.get::<String>("bench|hot").await) })
    });

    group.bench_function("backend_hit", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                manager
                    .typed::<String>("bench|hot")
                    .skip_local()
                    .get()
                    .await,
            )
        })
    });

    group.bench_function("miss", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(manager.get::<String>("bench|absent").await) })
    });

    group.finish();
}

/// Benchmark `get_or_set` when the value is already cached
fn bench_get_or_set_hot(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = create_bench_manager(&rt);

    c.bench_function("get_or_set_cached", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                manager
                    .get_or_set::<String, _, _>("bench|hot", None, || async {
                        Ok("recomputed".to_string())
                    })
                    .await,
            )
        })
    });
}

criterion_group!(
    benches,
    bench_key_construction,
    bench_cache_reads,
    bench_get_or_set_hot
);
criterion_main!(benches);
