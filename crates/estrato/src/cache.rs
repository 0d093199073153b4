// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The main cache type: the public operation surface over a tier stack.

use std::{fmt::Debug, hash::Hash, sync::Arc, time::Duration};

use solovuelo::SoloVuelo;
use tick::Clock;

use estrato_tier::{CacheEntry, Error};

use crate::{
    builder::CacheBuilder,
    health::Health,
    stack::TierStack,
    stats::CacheStats,
};

/// Per-entry write options for the get-or-compute operations.
///
/// # Examples
///
/// ```
/// use estrato::EntryOptions;
/// use std::time::Duration;
///
/// let options = EntryOptions::new()
///     .ttl(Duration::from_secs(60))
///     .tags(["search:mountain"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct EntryOptions {
    ttl: Option<Duration>,
    tags: Vec<String>,
}

impl EntryOptions {
    /// Creates options with no TTL override and no tags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the TTL for the computed entry, overriding the cache default.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the invalidation tags for the computed entry.
    #[must_use]
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    fn entry<V>(&self, value: V) -> CacheEntry<V> {
        let mut entry = CacheEntry::new(value);
        if let Some(ttl) = self.ttl {
            entry.set_ttl(ttl);
        }
        if !self.tags.is_empty() {
            entry.set_tags(self.tags.clone());
        }
        entry
    }
}

/// Single-flight groups for the get-or-compute operations.
///
/// One group per operation kind, keyed by cache key: concurrent callers for
/// the same missing key share one load.
struct Mergers<K, V> {
    get_or_insert: SoloVuelo<K, Result<CacheEntry<V>, Error>>,
    try_get_or_insert: SoloVuelo<K, Result<CacheEntry<V>, Error>>,
}

impl<K, V> Mergers<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn new() -> Self {
        Self {
            get_or_insert: SoloVuelo::new(),
            try_get_or_insert: SoloVuelo::new(),
        }
    }
}

impl<K, V> Debug for Mergers<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mergers").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) struct CacheInner<K, V> {
    pub(crate) stack: TierStack<K, V>,
    mergers: Mergers<K, V>,
}

/// One logical cache over an ordered hierarchy of tiers.
///
/// `Cache` is constructed once via [`Cache::builder`] and passed by reference
/// (or cheaply cloned) into every consumer; there is no global instance.
/// Every operation is safe to call from any number of concurrent tasks.
///
/// # Failure semantics
///
/// A tier being down never fails an operation while any tier (at minimum the
/// memory tier, which has no external dependency) still works. `get` and
/// `insert` only error when every tier failed; [`Cache::try_get_or_insert`]
/// additionally propagates the load function's own error to every caller
/// sharing that flight, without caching it.
///
/// # Examples
///
/// ```
/// use estrato::{Cache, CacheEntry};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let clock = Clock::new_frozen();
/// let cache = Cache::builder::<String, i32>(clock)
///     .memory(1000)
///     .build()?;
///
/// cache.insert(&"key".to_string(), CacheEntry::new(42)).await?;
/// let value = cache.get(&"key".to_string()).await?;
/// assert_eq!(*value.unwrap().value(), 42);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # });
/// ```
#[derive(Debug)]
pub struct Cache<K, V> {
    pub(crate) inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Cache<(), ()> {
    /// Creates a new cache builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use estrato::Cache;
    /// use tick::Clock;
    ///
    /// let clock = Clock::new_frozen();
    /// let cache = Cache::builder::<String, i32>(clock).memory(100).build();
    /// ```
    #[must_use]
    pub fn builder<K, V>(clock: Clock) -> CacheBuilder<K, V>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        CacheBuilder::new(clock)
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_stack(stack: TierStack<K, V>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                stack,
                mergers: Mergers::new(),
            }),
        }
    }

    /// Returns the cache's name (its namespace in telemetry output).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.stack.name
    }

    /// Returns a reference to the cache's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.stack.clock
    }

    /// Retrieves a value.
    ///
    /// Tiers are consulted in priority order; unreachable tiers are skipped
    /// and expired entries are never returned. A hit found below the first
    /// tier is promoted upward so later reads are served faster.
    ///
    /// # Errors
    ///
    /// Only when every tier failed for this call.
    pub async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.inner.stack.get(key).await
    }

    /// Retrieves many values in one pass per tier.
    ///
    /// The result has the same length and order as `keys`.
    ///
    /// # Errors
    ///
    /// Only when every tier failed for this call.
    pub async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
        self.inner.stack.get_many(keys).await
    }

    /// Inserts a value.
    ///
    /// The first tier is written synchronously, so a `get` from this process
    /// immediately afterwards observes the new value; remaining tiers are
    /// written best-effort and a remote failure does not fail the call.
    ///
    /// # Errors
    ///
    /// When the value cannot be serialized for a remote tier (a caller bug),
    /// or when every tier failed.
    pub async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.inner.stack.insert(key, entry).await
    }

    /// Inserts many values, following the same policy as [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// As for [`insert`](Self::insert).
    pub async fn insert_many(&self, entries: Vec<(K, CacheEntry<V>)>) -> Result<(), Error> {
        self.inner.stack.insert_many(entries).await
    }

    /// Removes a value from every reachable tier.
    ///
    /// A tier that is currently unreachable keeps its copy until TTL expiry
    /// or until the next write; reads still check TTL, so the staleness
    /// window is bounded.
    ///
    /// # Errors
    ///
    /// Only when every tier failed for this call.
    pub async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.inner.stack.invalidate(key).await
    }

    /// Removes every entry carrying `tag`, across all tiers.
    ///
    /// Tiers with native tag support get one bulk call; for the rest, the
    /// orchestrator's side index supplies the keys to delete individually.
    /// Returns the number of entries known to have been removed.
    ///
    /// # Errors
    ///
    /// Only when every tier failed for this call.
    pub async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        self.inner.stack.invalidate_tag(tag).await
    }

    /// Returns true if a live (non-expired) entry exists for the key.
    ///
    /// # Errors
    ///
    /// Only when every tier failed for this call.
    pub async fn contains(&self, key: &K) -> Result<bool, Error> {
        Ok(self.get(key).await?.is_some())
    }

    /// Clears every tier. Administrative; not intended for the hot path.
    ///
    /// # Errors
    ///
    /// Only when every tier failed.
    pub async fn clear(&self) -> Result<(), Error> {
        self.inner.stack.clear().await
    }

    /// Takes a point-in-time snapshot of per-tier statistics and health.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.stack.stats()
    }

    /// Returns each tier's current health, in priority order.
    #[must_use]
    pub fn health(&self) -> Vec<(&'static str, Health)> {
        self.inner
            .stack
            .slots
            .iter()
            .map(|slot| (slot.name, slot.health.current()))
            .collect()
    }

    /// Runs one health-probe pass over the non-healthy tiers.
    ///
    /// The builder schedules this automatically on the background prober
    /// when an async runtime is available; it is public so environments
    /// without one can drive probing themselves.
    pub async fn probe(&self) {
        self.inner.stack.probe_round().await;
    }

    /// Retrieves a value, or computes and caches it if missing.
    ///
    /// Concurrent calls for the same missing key are collapsed into a single
    /// flight: one caller runs `f`, everyone else shares the result.
    ///
    /// # Errors
    ///
    /// Only when the underlying cache operations fail on every tier.
    ///
    /// # Examples
    ///
    /// ```
    /// use estrato::Cache;
    /// use tick::Clock;
    /// # futures::executor::block_on(async {
    ///
    /// let clock = Clock::new_frozen();
    /// let cache = Cache::builder::<String, i32>(clock).memory(100).build()?;
    ///
    /// let entry = cache.get_or_insert(&"key".to_string(), || async { 42 }).await?;
    /// assert_eq!(*entry.value(), 42);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// # });
    /// ```
    pub async fn get_or_insert<Fut>(&self, key: &K, f: impl FnOnce() -> Fut + Send) -> Result<CacheEntry<V>, Error>
    where
        Fut: Future<Output = V> + Send,
    {
        self.get_or_insert_with(key, EntryOptions::new(), f).await
    }

    /// Like [`get_or_insert`](Self::get_or_insert), with explicit TTL and tags
    /// for the computed entry.
    ///
    /// # Errors
    ///
    /// As for [`get_or_insert`](Self::get_or_insert).
    pub async fn get_or_insert_with<Fut>(
        &self,
        key: &K,
        options: EntryOptions,
        f: impl FnOnce() -> Fut + Send,
    ) -> Result<CacheEntry<V>, Error>
    where
        Fut: Future<Output = V> + Send,
    {
        if let Some(entry) = self.inner.stack.get(key).await? {
            return Ok(entry);
        }

        self.inner
            .mergers
            .get_or_insert
            .work(key, || async move {
                // Another flight may have populated the key while we waited.
                if let Some(entry) = self.inner.stack.get(key).await? {
                    return Ok(entry);
                }
                let value = f().await;
                let mut entry = options.entry(value);
                entry.ensure_cached_at(self.inner.stack.clock.system_time());
                self.inner.stack.insert(key, entry.clone()).await?;
                Ok(entry)
            })
            .await
    }

    /// Retrieves a value, or computes and caches it with a fallible loader.
    ///
    /// Only successful loads are cached. A load error is delivered to every
    /// caller attached to the flight and the next call starts a fresh
    /// attempt; use `ohno::ErrorExt::find_source::<E>()` to recover the
    /// original error type.
    ///
    /// # Errors
    ///
    /// When the loader fails (wrapped, not cached) or when the underlying
    /// cache operations fail on every tier.
    pub async fn try_get_or_insert<E, Fut>(&self, key: &K, f: impl FnOnce() -> Fut + Send) -> Result<CacheEntry<V>, Error>
    where
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        self.try_get_or_insert_with(key, EntryOptions::new(), f).await
    }

    /// Like [`try_get_or_insert`](Self::try_get_or_insert), with explicit TTL
    /// and tags for the computed entry.
    ///
    /// # Errors
    ///
    /// As for [`try_get_or_insert`](Self::try_get_or_insert).
    pub async fn try_get_or_insert_with<E, Fut>(
        &self,
        key: &K,
        options: EntryOptions,
        f: impl FnOnce() -> Fut + Send,
    ) -> Result<CacheEntry<V>, Error>
    where
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send,
    {
        if let Some(entry) = self.inner.stack.get(key).await? {
            return Ok(entry);
        }

        self.inner
            .mergers
            .try_get_or_insert
            .work(key, || async move {
                if let Some(entry) = self.inner.stack.get(key).await? {
                    return Ok(entry);
                }
                let value = f().await.map_err(Error::from_message)?;
                let mut entry = options.entry(value);
                entry.ensure_cached_at(self.inner.stack.clock.system_time());
                self.inner.stack.insert(key, entry.clone()).await?;
                Ok(entry)
            })
            .await
    }
}
