// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    ops::Deref,
    time::{Duration, SystemTime},
};

/// A cached value with associated metadata.
///
/// `CacheEntry` wraps a value with an optional TTL, the timestamp at which it
/// was written, and the invalidation tags it carries. The cache system uses
/// this metadata for expiration tracking and tag-based bulk invalidation.
///
/// # Examples
///
/// ```
/// use estrato_tier::CacheEntry;
/// use std::time::Duration;
///
/// // Simple entry with just a value
/// let entry = CacheEntry::new(42);
/// assert_eq!(*entry.value(), 42);
///
/// // Entry with a per-entry TTL and invalidation tags
/// let entry = CacheEntry::with_ttl("data".to_string(), Duration::from_secs(60))
///     .with_tags(["search:mountain"]);
/// assert_eq!(entry.ttl(), Some(Duration::from_secs(60)));
/// assert_eq!(entry.tags(), ["search:mountain"]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    cached_at: Option<SystemTime>,
    /// Per-entry TTL override. If set, takes precedence over the cache-level TTL.
    ttl: Option<Duration>,
    tags: Vec<String>,
}

impl<V> CacheEntry<V> {
    /// Creates a new cache entry with the given value.
    ///
    /// The timestamp will be set by the cache when the entry is inserted.
    ///
    /// # Examples
    ///
    /// ```
    /// use estrato_tier::CacheEntry;
    ///
    /// let entry = CacheEntry::new(42);
    /// assert_eq!(*entry.value(), 42);
    /// assert!(entry.cached_at().is_none());
    /// ```
    pub fn new(value: V) -> Self {
        Self {
            value,
            cached_at: None,
            ttl: None,
            tags: Vec::new(),
        }
    }

    /// Creates a new cache entry with a per-entry TTL.
    ///
    /// The per-entry TTL takes precedence over any cache-level TTL.
    ///
    /// # Examples
    ///
    /// ```
    /// use estrato_tier::CacheEntry;
    /// use std::time::Duration;
    ///
    /// let entry = CacheEntry::with_ttl(42, Duration::from_secs(300));
    /// assert_eq!(entry.ttl(), Some(Duration::from_secs(300)));
    /// ```
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: None,
            ttl: Some(ttl),
            tags: Vec::new(),
        }
    }

    /// Attaches invalidation tags to this entry, replacing any existing tags.
    ///
    /// Tags are not unique; many entries may share a tag, and invalidating a
    /// tag removes every entry that carries it.
    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the timestamp at which this entry was written.
    ///
    /// Returns `None` if the entry hasn't been inserted yet.
    #[must_use]
    pub fn cached_at(&self) -> Option<SystemTime> {
        self.cached_at
    }

    /// Sets the timestamp at which this entry was written.
    ///
    /// This is typically called by the cache when inserting; the timestamp is
    /// never mutated afterwards, including on promotion between tiers.
    pub fn set_cached_at(&mut self, cached_at: SystemTime) {
        self.cached_at = Some(cached_at);
    }

    /// Sets the write timestamp only if none has been recorded yet.
    ///
    /// Promotions re-insert entries that already carry their original
    /// timestamp; this keeps expiry anchored to the original write.
    pub fn ensure_cached_at(&mut self, cached_at: SystemTime) {
        if self.cached_at.is_none() {
            self.cached_at = Some(cached_at);
        }
    }

    /// Returns the per-entry TTL, if set.
    ///
    /// Per-entry TTL takes precedence over the cache-level TTL. `None` means
    /// "use the store default".
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Sets the per-entry TTL.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = Some(ttl);
    }

    /// Returns the invalidation tags carried by this entry.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Replaces the invalidation tags on this entry.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    /// Consumes the entry and returns the inner value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<V> From<V> for CacheEntry<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}
