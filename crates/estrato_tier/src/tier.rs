// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.
//!
//! [`CacheTier`] defines the interface that all cache stores must implement.
//! This trait is designed for composition: implement the storage operations,
//! then use `estrato` to layer on health tracking, promotion, statistics, and
//! tag invalidation across an ordered tier hierarchy.

use crate::{CacheEntry, Error};

/// What a tier handles natively, as opposed to what the orchestrator must
/// emulate on its behalf.
///
/// A tier that does not support tags natively still participates in tag
/// invalidation: the orchestrator maintains a side index of tagged keys and
/// issues individual deletes. Likewise, batch operations against a tier
/// without native batch support simply cost one round trip per key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierCapabilities {
    /// The store expires entries on its own once their TTL elapses.
    pub native_ttl: bool,
    /// The store can bulk-delete every entry carrying a tag in one call.
    pub native_tags: bool,
    /// The store resolves `get_many`/`insert_many` in a single round trip.
    pub native_batch: bool,
}

impl TierCapabilities {
    /// Capabilities of a fully featured store.
    #[must_use]
    pub fn all() -> Self {
        Self {
            native_ttl: true,
            native_tags: true,
            native_batch: true,
        }
    }
}

/// Trait for cache tier implementations.
///
/// Implement this trait to create custom cache stores. The orchestrator in
/// `estrato` composes tiers in priority order and consults
/// [`capabilities`](CacheTier::capabilities) to decide which operations to
/// delegate and which to emulate.
///
/// All async methods are required. Only `capabilities`, `len` and `is_empty`
/// have default implementations:
/// - `capabilities`: Returns the conservative default (nothing native)
/// - `len`: Returns `None` (not all tiers track size)
/// - `is_empty`: Delegates to `len`
#[cfg_attr(
    any(test, feature = "dynamic-tier"),
    dynosaur::dynosaur(pub(crate) DynTier = dyn(box) CacheTier, bridge(none))
)]
pub trait CacheTier<K, V>: Send + Sync {
    /// Gets a value, returning an error if the operation fails.
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<CacheEntry<V>>, Error>> + Send;

    /// Gets many values in one logical operation.
    ///
    /// The result has the same length and order as `keys`.
    fn get_many(&self, keys: &[K]) -> impl Future<Output = Result<Vec<Option<CacheEntry<V>>>, Error>> + Send;

    /// Inserts a value, returning an error if the operation fails.
    fn insert(&self, key: &K, entry: CacheEntry<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Inserts many values in one logical operation.
    fn insert_many(&self, entries: &[(K, CacheEntry<V>)]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Invalidates a value, returning an error if the operation fails.
    fn invalidate(&self, key: &K) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes every entry carrying the given tag, returning how many were removed.
    ///
    /// Tiers without native tag support should report
    /// [`TierCapabilities::native_tags`] as `false`; the orchestrator then
    /// emulates this operation through its side index instead of calling it.
    fn invalidate_tag(&self, tag: &str) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Clears all entries, returning an error if the operation fails.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Performs a lightweight liveness check against the store.
    ///
    /// Used by background health probing; must not depend on any key existing.
    fn probe(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Describes what this store handles natively.
    fn capabilities(&self) -> TierCapabilities {
        TierCapabilities::default()
    }

    /// Returns the number of entries, if supported.
    ///
    /// Returns `None` for implementations that don't track size.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the cache contains no entries.
    ///
    /// Returns `None` for implementations that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}
