// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "memory")]

//! Integration tests for the core Cache API.

use std::time::{Duration, SystemTime};

use estrato::{Cache, CacheEntry};
use estrato_tier::CacheTier as _;
use estrato_tier::testing::{MockTier, TierOp};
use tick::{Clock, ClockControl};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

static_assertions::assert_impl_all!(estrato::Cache<String, i32>: Send, Sync, Clone);

#[test]
fn round_trip() -> TestResult {
    block_on(async {
        let cache = Cache::builder::<String, String>(Clock::new_frozen()).memory(100).build()?;

        cache.insert(&"key".to_string(), CacheEntry::new("value".to_string())).await?;
        let entry = cache.get(&"key".to_string()).await?;
        assert_eq!(entry.expect("entry should exist").value(), "value");
        Ok(())
    })
}

#[test]
fn missing_key_is_absent() -> TestResult {
    block_on(async {
        let cache = Cache::builder::<String, i32>(Clock::new_frozen()).memory(100).build()?;

        assert!(cache.get(&"missing".to_string()).await?.is_none());
        assert!(!cache.contains(&"missing".to_string()).await?);
        Ok(())
    })
}

#[test]
fn invalidate_removes_entry() -> TestResult {
    block_on(async {
        let cache = Cache::builder::<String, i32>(Clock::new_frozen()).memory(100).build()?;

        cache.insert(&"key".to_string(), CacheEntry::new(42)).await?;
        assert!(cache.contains(&"key".to_string()).await?);

        cache.invalidate(&"key".to_string()).await?;
        assert!(cache.get(&"key".to_string()).await?.is_none());
        Ok(())
    })
}

#[test]
fn ttl_expiry_via_entry_ttl() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let cache = Cache::builder::<String, String>(control.to_clock()).memory(100).build()?;

        cache
            .insert(
                &"key".to_string(),
                CacheEntry::with_ttl("value".to_string(), Duration::from_millis(50)),
            )
            .await?;
        assert!(cache.get(&"key".to_string()).await?.is_some());

        control.advance(Duration::from_millis(100));
        assert!(cache.get(&"key".to_string()).await?.is_none());
        Ok(())
    })
}

#[test]
fn ttl_expiry_via_cache_default() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let cache = Cache::builder::<String, i32>(control.to_clock())
            .memory(100)
            .default_ttl(Duration::from_millis(50))
            .build()?;

        cache.insert(&"key".to_string(), CacheEntry::new(1)).await?;
        assert!(cache.get(&"key".to_string()).await?.is_some());

        control.advance(Duration::from_millis(100));
        assert!(cache.get(&"key".to_string()).await?.is_none());
        Ok(())
    })
}

#[test]
fn lru_eviction_in_memory_tier() -> TestResult {
    block_on(async {
        let cache = Cache::builder::<String, i32>(Clock::new_frozen()).memory(3).build()?;

        for (key, value) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            cache.insert(&key.to_string(), CacheEntry::new(value)).await?;
        }

        assert!(cache.get(&"a".to_string()).await?.is_none());
        assert_eq!(*cache.get(&"d".to_string()).await?.expect("d should exist").value(), 4);
        Ok(())
    })
}

#[test]
fn expired_entry_from_a_remote_tier_is_a_miss() -> TestResult {
    block_on(async {
        let control = ClockControl::new();
        let clock = control.to_clock();

        // The remote mock holds an entry that expired long ago; the mock has
        // no TTL handling of its own, so the orchestrator must reject it.
        let remote: MockTier<String, i32> = MockTier::new();
        let mut stale = CacheEntry::with_ttl(1, Duration::from_millis(50));
        stale.set_cached_at(SystemTime::UNIX_EPOCH);
        remote.insert(&"key".to_string(), stale).await?;

        let cache = Cache::builder::<String, i32>(clock).memory(100).tier("remote", remote).build()?;

        assert!(cache.get(&"key".to_string()).await?.is_none());
        Ok(())
    })
}

#[test]
fn read_your_writes_with_unacknowledged_remote() -> TestResult {
    block_on(async {
        let remote: MockTier<String, String> = MockTier::new();
        let cache = Cache::builder::<String, String>(Clock::new_frozen())
            .memory(100)
            .tier("remote", remote.clone())
            .build()?;

        // Seed an old value everywhere, then make the remote drop writes on
        // the floor - as if its acknowledgement never arrives.
        cache.insert(&"key".to_string(), CacheEntry::new("old".to_string())).await?;
        remote.fail_when(|op| matches!(op, TierOp::Insert { .. }));

        cache.insert(&"key".to_string(), CacheEntry::new("new".to_string())).await?;

        // The remote still holds "old", but the synchronous memory write
        // guarantees this process reads its own write.
        let entry = cache.get(&"key".to_string()).await?;
        assert_eq!(entry.expect("entry should exist").value(), "new");
        Ok(())
    })
}

#[test]
fn insert_overwrites_fully() -> TestResult {
    block_on(async {
        let cache = Cache::builder::<String, String>(Clock::new_frozen()).memory(100).build()?;

        cache
            .insert(
                &"key".to_string(),
                CacheEntry::with_ttl("v1".to_string(), Duration::from_secs(60)).with_tags(["old"]),
            )
            .await?;
        cache.insert(&"key".to_string(), CacheEntry::new("v2".to_string())).await?;

        let entry = cache.get(&"key".to_string()).await?.expect("entry should exist");
        assert_eq!(entry.value(), "v2");
        assert!(entry.tags().is_empty());

        // The replaced entry's tag no longer matches anything.
        assert_eq!(cache.invalidate_tag("old").await?, 0);
        assert!(cache.contains(&"key".to_string()).await?);
        Ok(())
    })
}

#[test]
fn clear_empties_every_tier() -> TestResult {
    block_on(async {
        let remote: MockTier<String, i32> = MockTier::new();
        let cache = Cache::builder::<String, i32>(Clock::new_frozen())
            .memory(100)
            .tier("remote", remote.clone())
            .build()?;

        cache.insert(&"a".to_string(), CacheEntry::new(1)).await?;
        cache.insert(&"b".to_string(), CacheEntry::new(2)).await?;
        assert_eq!(remote.entry_count(), 2);

        cache.clear().await?;
        assert!(cache.get(&"a".to_string()).await?.is_none());
        assert_eq!(remote.entry_count(), 0);
        Ok(())
    })
}

#[test]
fn stats_track_hits_misses_and_inserts() -> TestResult {
    block_on(async {
        let cache = Cache::builder::<String, i32>(Clock::new_frozen()).memory(100).build()?;

        cache.insert(&"key".to_string(), CacheEntry::new(1)).await?;
        let _ = cache.get(&"key".to_string()).await?;
        let _ = cache.get(&"missing".to_string()).await?;

        let stats = cache.stats();
        let memory = stats.tier("memory").expect("memory tier should be reported");
        assert_eq!(memory.hits, 1);
        assert_eq!(memory.misses, 1);
        assert_eq!(memory.inserts, 1);
        assert_eq!(memory.entries, Some(1));
        Ok(())
    })
}
