// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamic cache tier wrapper for type erasure.

use std::{fmt::Debug, sync::Arc};

use crate::{CacheEntry, CacheTier, Error, TierCapabilities, tier::DynTier};

/// Extension trait for converting any `CacheTier` into a `DynamicTier`.
///
/// This trait is automatically implemented for all types that implement `CacheTier`.
///
/// # Examples
///
/// ```
/// use estrato_tier::{CacheTier, DynamicTier, DynamicTierExt};
///
/// fn erase<T>(tier: T) -> DynamicTier<String, i32>
/// where
///     T: CacheTier<String, i32> + 'static,
/// {
///     tier.into_dynamic()
/// }
/// ```
pub trait DynamicTierExt<K, V>: Sized {
    /// Converts this cache tier into a `DynamicTier`.
    fn into_dynamic(self) -> DynamicTier<K, V>;
}

impl<K, V, T> DynamicTierExt<K, V> for T
where
    T: CacheTier<K, V> + 'static,
{
    fn into_dynamic(self) -> DynamicTier<K, V> {
        DynamicTier::new(self)
    }
}

/// A clonable dynamic cache tier with type erasure.
///
/// `DynamicTier` wraps a trait object in an `Arc` to enable cloning while
/// maintaining dynamic dispatch. The orchestrator uses this to hold an ordered
/// list of heterogeneous stores (memory, Redis, mocks) behind one type.
pub struct DynamicTier<K, V>(Arc<DynTier<'static, K, V>>);

impl<K, V> DynamicTier<K, V> {
    /// Creates a new dynamic tier from any `CacheTier` implementation.
    pub(crate) fn new<T>(tier: T) -> Self
    where
        T: CacheTier<K, V> + Send + Sync + 'static,
    {
        Self(DynTier::new_arc(tier))
    }
}

impl<K, V> Debug for DynamicTier<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicTier").finish()
    }
}

impl<K, V> Clone for DynamicTier<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> CacheTier<K, V> for DynamicTier<K, V>
where
    K: Sync,
    V: Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.0.get(key).await
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
        self.0.get_many(keys).await
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.0.insert(key, entry).await
    }

    async fn insert_many(&self, entries: &[(K, CacheEntry<V>)]) -> Result<(), Error> {
        self.0.insert_many(entries).await
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.0.invalidate(key).await
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        self.0.invalidate_tag(tag).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.0.clear().await
    }

    async fn probe(&self) -> Result<(), Error> {
        self.0.probe().await
    }

    fn capabilities(&self) -> TierCapabilities {
        self.0.capabilities()
    }

    fn len(&self) -> Option<u64> {
        self.0.len()
    }

    fn is_empty(&self) -> Option<bool> {
        self.0.is_empty()
    }
}
