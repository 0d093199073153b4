// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the `CacheTier` trait surface: implementing the
//! trait outside the crate and erasing it behind `DynamicTier`.

use std::{collections::HashMap, hash::Hash, sync::RwLock};

use estrato_tier::{CacheEntry, CacheTier, DynamicTier, DynamicTierExt, Error, TierCapabilities};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

/// A minimal external tier implementation, as a downstream crate would write one.
struct SimpleTier<K, V>(RwLock<HashMap<K, CacheEntry<V>>>);

impl<K, V> SimpleTier<K, V> {
    fn new() -> Self {
        Self(RwLock::new(HashMap::new()))
    }
}

impl<K, V> CacheTier<K, V> for SimpleTier<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        Ok(self.0.read().expect("lock poisoned").get(key).cloned())
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
        let data = self.0.read().expect("lock poisoned");
        Ok(keys.iter().map(|k| data.get(k).cloned()).collect())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.0.write().expect("lock poisoned").insert(key.clone(), entry);
        Ok(())
    }

    async fn insert_many(&self, entries: &[(K, CacheEntry<V>)]) -> Result<(), Error> {
        let mut data = self.0.write().expect("lock poisoned");
        for (key, entry) in entries {
            data.insert(key.clone(), entry.clone());
        }
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.0.write().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        let mut data = self.0.write().expect("lock poisoned");
        let keys: Vec<K> = data
            .iter()
            .filter(|(_, entry)| entry.tags().iter().any(|t| t == tag))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            data.remove(key);
        }
        Ok(keys.len() as u64)
    }

    async fn clear(&self) -> Result<(), Error> {
        self.0.write().expect("lock poisoned").clear();
        Ok(())
    }

    async fn probe(&self) -> Result<(), Error> {
        Ok(())
    }

    fn capabilities(&self) -> TierCapabilities {
        TierCapabilities {
            native_ttl: false,
            native_tags: true,
            native_batch: false,
        }
    }

    fn len(&self) -> Option<u64> {
        Some(self.0.read().expect("lock poisoned").len() as u64)
    }
}

#[test]
fn external_impl_round_trip() {
    block_on(async {
        let tier = SimpleTier::<String, i32>::new();

        tier.insert(&"key".to_string(), CacheEntry::new(42)).await.expect("insert failed");
        let entry = tier.get(&"key".to_string()).await.expect("get failed");
        assert_eq!(*entry.expect("entry should exist").value(), 42);

        tier.invalidate(&"key".to_string()).await.expect("invalidate failed");
        assert!(tier.get(&"key".to_string()).await.expect("get failed").is_none());
    });
}

#[test]
fn external_impl_tag_invalidation() {
    block_on(async {
        let tier = SimpleTier::<String, String>::new();

        tier.insert(&"k1".to_string(), CacheEntry::new("a".to_string()).with_tags(["t"]))
            .await
            .expect("insert failed");
        tier.insert(&"k2".to_string(), CacheEntry::new("b".to_string()))
            .await
            .expect("insert failed");

        let removed = tier.invalidate_tag("t").await.expect("invalidate_tag failed");
        assert_eq!(removed, 1);
        assert_eq!(tier.len(), Some(1));
    });
}

#[test]
fn dynamic_tier_preserves_behavior() {
    block_on(async {
        let dynamic: DynamicTier<String, i32> = SimpleTier::new().into_dynamic();

        dynamic.insert(&"key".to_string(), CacheEntry::new(42)).await.expect("insert failed");
        let entry = dynamic.get(&"key".to_string()).await.expect("get failed");
        assert_eq!(*entry.expect("entry should exist").value(), 42);

        assert_eq!(dynamic.len(), Some(1));
        assert_eq!(dynamic.is_empty(), Some(false));
    });
}

#[test]
fn dynamic_tier_forwards_capabilities() {
    let dynamic: DynamicTier<String, i32> = SimpleTier::new().into_dynamic();

    let caps = dynamic.capabilities();
    assert!(caps.native_tags);
    assert!(!caps.native_batch);
}

#[test]
fn dynamic_tier_forwards_batch_operations() {
    block_on(async {
        let dynamic: DynamicTier<String, i32> = SimpleTier::new().into_dynamic();

        dynamic
            .insert_many(&[
                ("a".to_string(), CacheEntry::new(1)),
                ("b".to_string(), CacheEntry::new(2)),
            ])
            .await
            .expect("insert_many failed");

        let keys = ["a".to_string(), "missing".to_string(), "b".to_string()];
        let values = dynamic.get_many(&keys).await.expect("get_many failed");

        assert_eq!(values.len(), 3);
        assert_eq!(*values[0].as_ref().expect("a should exist").value(), 1);
        assert!(values[1].is_none());
        assert_eq!(*values[2].as_ref().expect("b should exist").value(), 2);
    });
}

#[test]
fn dynamic_tier_is_cloneable() {
    block_on(async {
        let dynamic: DynamicTier<String, i32> = SimpleTier::new().into_dynamic();
        let clone = dynamic.clone();

        dynamic.insert(&"key".to_string(), CacheEntry::new(1)).await.expect("insert failed");
        let entry = clone.get(&"key".to_string()).await.expect("get failed");
        assert!(entry.is_some());
    });
}
