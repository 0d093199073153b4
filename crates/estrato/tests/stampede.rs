// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "memory")]

//! Integration tests for stampede suppression on the get-or-compute path.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering::SeqCst},
    },
    time::Duration,
};

use estrato::{Cache, EntryOptions};
use futures::{StreamExt, stream::FuturesUnordered};
use ohno::ErrorExt as _;
use tick::Clock;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Loader error used to verify error propagation through the cache chain.
#[derive(Debug)]
struct LoadFailed;

impl std::fmt::Display for LoadFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream load failed")
    }
}

impl std::error::Error for LoadFailed {}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_get_or_insert_loads_once() -> TestResult {
    let cache = Cache::builder::<String, String>(Clock::new_frozen())
        .memory(100)
        .background_probes(false)
        .build()?;
    let loads = Arc::new(AtomicUsize::new(0));
    let key = "key".to_string();

    let flights = FuturesUnordered::new();
    for _ in 0..50 {
        let loads = Arc::clone(&loads);
        flights.push(cache.get_or_insert(&key, move || async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            loads.fetch_add(1, SeqCst);
            "loaded".to_string()
        }));
    }

    let results: Vec<_> = flights.collect().await;
    assert_eq!(results.len(), 50);
    for result in results {
        assert_eq!(result?.value(), "loaded");
    }
    assert_eq!(loads.load(SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn cached_key_does_not_invoke_loader() -> TestResult {
    let cache = Cache::builder::<String, i32>(Clock::new_frozen())
        .memory(100)
        .background_probes(false)
        .build()?;

    let first = cache.get_or_insert(&"key".to_string(), || async { 1 }).await?;
    assert_eq!(*first.value(), 1);

    let second = cache
        .get_or_insert(&"key".to_string(), || async { unreachable!("value is already cached") })
        .await?;
    assert_eq!(*second.value(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn loader_errors_are_shared_but_not_cached() -> TestResult {
    let cache = Cache::builder::<String, String>(Clock::new_frozen())
        .memory(100)
        .background_probes(false)
        .build()?;
    let loads = Arc::new(AtomicUsize::new(0));
    let key = "key".to_string();

    let flights = FuturesUnordered::new();
    for _ in 0..10 {
        let loads = Arc::clone(&loads);
        flights.push(cache.try_get_or_insert(&key, move || async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            loads.fetch_add(1, SeqCst);
            Err::<String, LoadFailed>(LoadFailed)
        }));
    }

    let results: Vec<_> = flights.collect().await;
    for result in results {
        let err = result.expect_err("the shared load failed");
        assert!(err.find_source::<LoadFailed>().is_some());
    }
    assert_eq!(loads.load(SeqCst), 1);

    // Nothing was cached; the next call gets a fresh attempt.
    let recovered = cache
        .try_get_or_insert(&"key".to_string(), || async { Ok::<_, LoadFailed>("recovered".to_string()) })
        .await?;
    assert_eq!(recovered.value(), "recovered");
    assert_eq!(loads.load(SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn options_apply_to_the_computed_entry() -> TestResult {
    let cache = Cache::builder::<String, String>(Clock::new_frozen())
        .memory(100)
        .background_probes(false)
        .build()?;

    let entry = cache
        .get_or_insert_with(
            &"img:123".to_string(),
            EntryOptions::new().ttl(Duration::from_secs(1)).tags(["search:mountain"]),
            || async { "url".to_string() },
        )
        .await?;

    assert_eq!(entry.ttl(), Some(Duration::from_secs(1)));
    assert_eq!(entry.tags(), ["search:mountain"]);
    assert!(entry.cached_at().is_some());

    assert_eq!(cache.invalidate_tag("search:mountain").await?, 1);
    assert!(cache.get(&"img:123".to_string()).await?.is_none());
    Ok(())
}
