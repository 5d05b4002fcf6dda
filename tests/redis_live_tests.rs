//! # Live Redis Integration Tests
//!
//! Exercises the full store + pub/sub path against a real Redis instance.
//! All tests are `#[ignore]`d; set `REDIS_URL` (e.g.
//! `redis://localhost:6379`) and run with `cargo test -- --ignored`.

use chain_cache::{build_key, CacheConfig, CacheRuntime, TtlPair};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn live_config(prefix: &str) -> Option<CacheConfig> {
    let url = std::env::var("REDIS_URL").ok()?;
    // Namespace by pid so reruns never observe a previous run's entries.
    let run = std::process::id();
    let mut config = CacheConfig::default();
    config.remote.url = url.clone();
    config.remote.key_prefix = format!("chain-cache-live:{}:{}:", run, prefix);
    config.invalidation.url = url;
    config.invalidation.channel = format!("chain-cache-live:{}:{}:invalidate", run, prefix);
    Some(config)
}

#[tokio::test]
#[ignore] // Requires a live Redis; set REDIS_URL to run.
async fn read_through_populates_redis() {
    let config = live_config("read-through").expect("REDIS_URL not set");
    let runtime = CacheRuntime::start(config).await.unwrap();
    let cache = runtime.service();
    let key = build_key("pair", &["0xlive", "reserves"]);

    let calls = Arc::new(AtomicU32::new(0));
    for _ in 0..2 {
        let calls = Arc::clone(&calls);
        let value: u64 = cache
            .get_or_set(&key, TtlPair::fast(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(314u64)
            })
            .await
            .unwrap();
        assert_eq!(value, 314);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a live Redis; set REDIS_URL to run.
async fn invalidation_crosses_runtimes() {
    let config = live_config("cross").expect("REDIS_URL not set");
    let runtime_a = CacheRuntime::start(config.clone()).await.unwrap();
    let runtime_b = CacheRuntime::start(config).await.unwrap();
    let replica_a = runtime_a.service();
    let replica_b = runtime_b.service();

    // Let both subscribers establish their pub/sub connections.
    sleep(Duration::from_millis(200)).await;

    let key = build_key("pair", &["0xlive", "price"]);
    let long_ttl = TtlPair::new(Duration::from_secs(600), Duration::from_secs(500));

    let v: u64 = replica_b
        .get_or_set(&key, long_ttl, || async { Ok(1u64) })
        .await
        .unwrap();
    assert_eq!(v, 1);

    replica_a
        .set_and_invalidate(&key, &2u64, Duration::from_secs(600))
        .await
        .unwrap();
    sleep(Duration::from_millis(300)).await;

    let calls = Arc::new(AtomicU32::new(0));
    let calls_in_factory = Arc::clone(&calls);
    let v: u64 = replica_b
        .get_or_set(&key, long_ttl, move || async move {
            calls_in_factory.fetch_add(1, Ordering::SeqCst);
            Ok(0u64)
        })
        .await
        .unwrap();
    assert_eq!(v, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    runtime_a.shutdown().await.unwrap();
    runtime_b.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires a live Redis; set REDIS_URL to run.
async fn writer_batch_invalidates_all_keys() {
    let config = live_config("batch").expect("REDIS_URL not set");
    let runtime = CacheRuntime::start(config).await.unwrap();
    let cache = runtime.service();

    sleep(Duration::from_millis(200)).await;

    let long_ttl = TtlPair::new(Duration::from_secs(600), Duration::from_secs(500));
    let reserves = build_key("pair", &["0xlive", "reserves"]);
    let price = build_key("pair", &["0xlive", "firstTokenPrice"]);

    let _: u64 = cache
        .get_or_set(&reserves, long_ttl, || async { Ok(1u64) })
        .await
        .unwrap();
    let _: u64 = cache
        .get_or_set(&price, long_ttl, || async { Ok(1u64) })
        .await
        .unwrap();

    let mut batch = cache.batch();
    batch
        .set(&reserves, &10u64, Duration::from_secs(600))
        .await
        .unwrap();
    batch
        .set(&price, &20u64, Duration::from_secs(600))
        .await
        .unwrap();
    batch.commit().await.unwrap();
    sleep(Duration::from_millis(300)).await;

    let v: u64 = cache
        .get_or_set(&reserves, long_ttl, || async { Ok(0u64) })
        .await
        .unwrap();
    assert_eq!(v, 10);
    let v: u64 = cache
        .get_or_set(&price, long_ttl, || async { Ok(0u64) })
        .await
        .unwrap();
    assert_eq!(v, 20);

    runtime.shutdown().await.unwrap();
}
