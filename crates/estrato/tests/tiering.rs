// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "memory")]

//! Integration tests for tier orchestration: promotion, fallback on tier
//! failure, health transitions, and the promotion-vs-write race.

use std::sync::Arc;
use std::time::Duration;

use estrato::{AllTiersUnavailable, Cache, CacheEntry, Health, HealthPolicy};
use estrato_tier::testing::{MockTier, TierOp};
use estrato_tier::{CacheTier, Error, TierCapabilities};
use ohno::ErrorExt as _;
use tick::Clock;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn two_tier_cache(remote: MockTier<String, String>) -> Cache<String, String> {
    Cache::builder::<String, String>(Clock::new_frozen())
        .memory(100)
        .tier("remote", remote)
        .build()
        .expect("configuration is valid")
}

#[test]
fn hit_in_lower_tier_is_promoted() -> TestResult {
    block_on(async {
        let remote: MockTier<String, String> = MockTier::new();
        remote.insert(&"key".to_string(), CacheEntry::new("value".to_string())).await?;
        let cache = two_tier_cache(remote.clone());

        let entry = cache.get(&"key".to_string()).await?;
        assert_eq!(entry.expect("entry should exist").value(), "value");

        // The hit was copied into the memory tier; the next read stops there.
        remote.clear_operations();
        let entry = cache.get(&"key".to_string()).await?;
        assert_eq!(entry.expect("entry should exist").value(), "value");
        assert!(remote.operations().is_empty());

        let stats = cache.stats();
        assert_eq!(stats.tier("memory").expect("memory tier").promotions, 1);
        Ok(())
    })
}

#[test]
fn promotion_does_not_reset_expiry() -> TestResult {
    block_on(async {
        let control = tick::ClockControl::new();
        let clock = control.to_clock();

        let remote: MockTier<String, String> = MockTier::new();
        let cache = Cache::builder::<String, String>(clock.clone())
            .memory(100)
            .tier("remote", remote.clone())
            .build()?;

        // The remote holds an entry written 60ms ago with 100ms to live.
        let mut entry = CacheEntry::with_ttl("value".to_string(), Duration::from_millis(100));
        entry.set_cached_at(clock.system_time());
        remote.insert(&"key".to_string(), entry).await?;
        control.advance(Duration::from_millis(60));

        // Reading promotes it into the memory tier with its original timestamp.
        assert!(cache.get(&"key".to_string()).await?.is_some());

        // 60ms later the original TTL has elapsed; the promoted copy must not
        // have gained a fresh lease on life.
        control.advance(Duration::from_millis(60));
        assert!(cache.get(&"key".to_string()).await?.is_none());
        Ok(())
    })
}

#[test]
fn tier_failure_falls_back_and_degrades_health() -> TestResult {
    block_on(async {
        let remote: MockTier<String, String> = MockTier::new();
        let cache = two_tier_cache(remote.clone());

        remote.fail_when(|_| true);

        // Reads and writes still succeed via the memory tier.
        cache.insert(&"key".to_string(), CacheEntry::new("value".to_string())).await?;
        let entry = cache.get(&"key".to_string()).await?;
        assert_eq!(entry.expect("entry should exist").value(), "value");

        let health = cache.stats().tier("remote").expect("remote tier").health;
        assert_ne!(health, Health::Healthy);
        Ok(())
    })
}

#[test]
fn failing_tier_eventually_becomes_unreachable() -> TestResult {
    block_on(async {
        let remote: MockTier<String, String> = MockTier::new();
        let cache = two_tier_cache(remote.clone());
        remote.fail_when(|_| true);

        // Hammer the failing tier; one failure degrades it, three more in
        // the window make it unreachable.
        for _ in 0..4 {
            let _ = cache.get(&"key".to_string()).await?;
        }
        assert_eq!(cache.stats().tier("remote").expect("remote tier").health, Health::Unreachable);

        // Unreachable tiers are skipped entirely on the hot path.
        remote.clear_operations();
        let _ = cache.get(&"key".to_string()).await?;
        assert!(remote.operations().is_empty());
        Ok(())
    })
}

#[test]
fn probe_walks_health_back_up() -> TestResult {
    block_on(async {
        let remote: MockTier<String, String> = MockTier::new();
        let cache = two_tier_cache(remote.clone());
        remote.fail_when(|_| true);

        for _ in 0..4 {
            let _ = cache.get(&"key".to_string()).await?;
        }
        assert_eq!(cache.stats().tier("remote").expect("remote tier").health, Health::Unreachable);

        // The service recovers; successive probes walk the tier back to healthy.
        remote.clear_failures();
        cache.probe().await;
        assert_eq!(cache.stats().tier("remote").expect("remote tier").health, Health::Degraded);
        cache.probe().await;
        assert_eq!(cache.stats().tier("remote").expect("remote tier").health, Health::Healthy);
        Ok(())
    })
}

#[test]
fn all_tiers_failing_surfaces_one_error() -> TestResult {
    block_on(async {
        let only: MockTier<String, String> = MockTier::new();
        let cache = Cache::builder::<String, String>(Clock::new_frozen())
            .tier("remote", only.clone())
            .health_policy(HealthPolicy {
                // Large threshold keeps the tier attempted for this test.
                unreachable_after: 1000,
                ..HealthPolicy::default()
            })
            .build()?;

        only.fail_when(|_| true);

        let err = cache.get(&"key".to_string()).await.expect_err("every tier failed");
        assert!(err.find_source::<AllTiersUnavailable>().is_some());

        let err = cache
            .insert(&"key".to_string(), CacheEntry::new("v".to_string()))
            .await
            .expect_err("every tier failed");
        assert!(err.find_source::<AllTiersUnavailable>().is_some());
        Ok(())
    })
}

#[test]
fn degraded_tier_is_still_attempted() -> TestResult {
    block_on(async {
        let remote: MockTier<String, String> = MockTier::new();
        remote.insert(&"key".to_string(), CacheEntry::new("value".to_string())).await?;
        let cache = two_tier_cache(remote.clone());

        // One failure degrades the tier but does not remove it from the path.
        remote.fail_when(|op| matches!(op, TierOp::Get(_)));
        let _ = cache.get(&"key".to_string()).await?;
        assert_eq!(cache.stats().tier("remote").expect("remote tier").health, Health::Degraded);

        remote.clear_failures();
        let entry = cache.get(&"key".to_string()).await?;
        assert_eq!(entry.expect("entry should exist").value(), "value");
        assert_eq!(cache.stats().tier("remote").expect("remote tier").health, Health::Healthy);
        Ok(())
    })
}

/// A tier whose reads block until released, for staging races deterministically.
#[derive(Clone)]
struct GatedTier {
    inner: MockTier<String, String>,
    gate: Arc<tokio::sync::Semaphore>,
}

impl GatedTier {
    fn new(inner: MockTier<String, String>) -> Self {
        Self {
            inner,
            gate: Arc::new(tokio::sync::Semaphore::new(0)),
        }
    }

    fn release_one_get(&self) {
        self.gate.add_permits(1);
    }
}

impl CacheTier<String, String> for GatedTier {
    async fn get(&self, key: &String) -> Result<Option<CacheEntry<String>>, Error> {
        // Read first, then park: the caller observes the pre-release value
        // even if the store changes while the response is "on the wire".
        let value = self.inner.get(key).await?;
        let permit = self.gate.acquire().await.map_err(Error::from_message)?;
        permit.forget();
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<CacheEntry<String>>>, Error> {
        self.inner.get_many(keys).await
    }

    async fn insert(&self, key: &String, entry: CacheEntry<String>) -> Result<(), Error> {
        self.inner.insert(key, entry).await
    }

    async fn insert_many(&self, entries: &[(String, CacheEntry<String>)]) -> Result<(), Error> {
        self.inner.insert_many(entries).await
    }

    async fn invalidate(&self, key: &String) -> Result<(), Error> {
        self.inner.invalidate(key).await
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        self.inner.invalidate_tag(tag).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.clear().await
    }

    async fn probe(&self) -> Result<(), Error> {
        self.inner.probe().await
    }

    fn capabilities(&self) -> TierCapabilities {
        self.inner.capabilities()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_write_beats_in_flight_promotion() -> TestResult {
    let backing: MockTier<String, String> = MockTier::new();
    backing.insert(&"key".to_string(), CacheEntry::new("stale".to_string())).await?;
    let gated = GatedTier::new(backing.clone());

    let cache = Cache::builder::<String, String>(Clock::new_frozen())
        .memory(100)
        .tier("remote", gated.clone())
        .background_probes(false)
        .build()?;

    // A reader misses the memory tier and parks inside the remote read.
    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(&"key".to_string()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // A write completes while the read is still in flight. The write is the
    // later operation by completion time, so it must win.
    cache.insert(&"key".to_string(), CacheEntry::new("fresh".to_string())).await?;

    // Let the parked read finish; it observed the pre-write value and will
    // try to promote it into the memory tier.
    gated.release_one_get();
    let raced = reader.await.expect("reader should not panic")?;
    assert_eq!(raced.expect("entry should exist").value(), "stale");

    // The stale promotion was discarded: the cache still serves the write.
    gated.release_one_get();
    let entry = cache.get(&"key".to_string()).await?;
    assert_eq!(entry.expect("entry should exist").value(), "fresh");
    Ok(())
}
