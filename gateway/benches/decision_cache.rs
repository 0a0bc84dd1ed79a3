//! Decision cache benchmarks
//!
//! Run with: cargo bench --features=benchmarks

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use tokio::runtime::Runtime;

use edge_gateway::auth::{
    AuthBackend, BackendDecision, CacheKey, CacheStore, CachedAuthenticator, ConnectionId,
    Decision,
};
use edge_gateway::config::CacheConfig;
use edge_gateway::error::BackendError;

struct AllowAll;

#[async_trait]
impl AuthBackend for AllowAll {
    async fn verify(&self, _: &ConnectionId, _: &str) -> Result<BackendDecision, BackendError> {
        Ok(BackendDecision::allow(300_000))
    }
}

/// Cached verify, the path taken by every publish after the first.
fn bench_cache_hits(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = CachedAuthenticator::new(CacheConfig::default(), Arc::new(AllowAll)).unwrap();
    let connections: Vec<ConnectionId> = (0..100).map(|_| ConnectionId::new()).collect();
    let topics: Vec<String> = (0..50).map(|i| format!("prices/{}", i)).collect();

    rt.block_on(async {
        for connection in &connections {
            for topic in &topics {
                cache.verify(connection, topic).await;
            }
        }
    });

    c.bench_function("verify_cache_hit", |b| {
        let mut counter = 0usize;
        b.to_async(&rt).iter(|| {
            counter += 1;
            let connection = connections[counter % connections.len()];
            let topic = topics[counter % topics.len()].clone();
            let cache = cache.clone();
            async move {
                black_box(cache.verify(&connection, &topic).await);
            }
        })
    });
}

/// Snapshot cost grows with the store; the watchdog takes one per tick.
fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_snapshot");

    for size in [100usize, 1_000, 10_000] {
        let store = CacheStore::new();
        let now = tokio::time::Instant::now();
        for i in 0..size {
            let key = CacheKey::new(ConnectionId::new(), format!("topic/{}", i % 10));
            store.put(key, Decision::AllowIndefinite, now);
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| black_box(store.snapshot()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_cache_hits, bench_snapshot);
criterion_main!(benches);
