// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Round-trip tests against a live Redis instance.
//!
//! These are ignored by default; run them with a local server via
//! `cargo test -p estrato_redis -- --ignored`.

use std::time::Duration;

use estrato_redis::RedisTier;
use estrato_tier::{CacheEntry, CacheTier};
use tick::Clock;

fn tier(namespace: &str) -> RedisTier<String, String> {
    RedisTier::builder("redis://127.0.0.1/")
        .namespace(namespace)
        .op_timeout(Duration::from_secs(2))
        .build(Clock::new_tokio())
        .expect("valid url should build")
}

#[tokio::test]
#[ignore = "requires a running redis server on 127.0.0.1:6379"]
async fn round_trip_and_invalidate() {
    let tier = tier("estrato-live-rt");
    tier.clear().await.expect("clear failed");

    tier.insert(&"k".to_string(), CacheEntry::new("v".to_string()))
        .await
        .expect("insert failed");
    let entry = tier.get(&"k".to_string()).await.expect("get failed");
    assert_eq!(entry.expect("entry should exist").value(), "v");

    tier.invalidate(&"k".to_string()).await.expect("invalidate failed");
    assert!(tier.get(&"k".to_string()).await.expect("get failed").is_none());
}

#[tokio::test]
#[ignore = "requires a running redis server on 127.0.0.1:6379"]
async fn tag_invalidation_is_bulk() {
    let tier = tier("estrato-live-tags");
    tier.clear().await.expect("clear failed");

    for key in ["k1", "k2"] {
        tier.insert(
            &key.to_string(),
            CacheEntry::new("v".to_string()).with_tags(["search:mountain"]),
        )
        .await
        .expect("insert failed");
    }
    tier.insert(&"k3".to_string(), CacheEntry::new("v".to_string()))
        .await
        .expect("insert failed");

    let removed = tier.invalidate_tag("search:mountain").await.expect("invalidate_tag failed");
    assert_eq!(removed, 2);
    assert!(tier.get(&"k1".to_string()).await.expect("get failed").is_none());
    assert!(tier.get(&"k3".to_string()).await.expect("get failed").is_some());
}

#[tokio::test]
#[ignore = "requires a running redis server on 127.0.0.1:6379"]
async fn native_ttl_expires_entries() {
    let tier = tier("estrato-live-ttl");
    tier.clear().await.expect("clear failed");

    tier.insert(
        &"k".to_string(),
        CacheEntry::with_ttl("v".to_string(), Duration::from_millis(50)),
    )
    .await
    .expect("insert failed");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(tier.get(&"k".to_string()).await.expect("get failed").is_none());
}
