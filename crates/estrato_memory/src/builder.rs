// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-process memory tiers.

use std::hash::Hash;
use std::marker::PhantomData;
use std::time::Duration;

use tick::Clock;

use crate::tier::MemoryTier;

/// Builder for configuring a [`MemoryTier`].
///
/// # Examples
///
/// ```
/// use estrato_memory::MemoryTierBuilder;
/// use std::time::Duration;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let tier = MemoryTierBuilder::<String, i32>::new()
///     .max_entries(1000)
///     .time_to_live(Duration::from_secs(300))
///     .build(clock);
/// ```
#[derive(Debug)]
pub struct MemoryTierBuilder<K, V> {
    pub(crate) max_entries: Option<usize>,
    pub(crate) time_to_live: Option<Duration>,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> Default for MemoryTierBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoryTierBuilder<K, V> {
    /// Creates a new builder with default settings.
    ///
    /// The default configuration creates an unbounded tier with no tier-level
    /// expiration (per-entry TTLs still apply).
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_entries: None,
            time_to_live: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries held by the tier.
    ///
    /// Once the capacity is reached, inserting a new key evicts the
    /// least-recently-used entry first. Entries with identical recency evict
    /// in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn max_entries(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "max_entries must be at least 1");
        self.max_entries = Some(capacity);
        self
    }

    /// Sets the tier-level time-to-live applied to entries without their own TTL.
    ///
    /// A per-entry TTL set via [`CacheEntry::with_ttl`](estrato_tier::CacheEntry::with_ttl)
    /// takes precedence over this value. Expired entries are removed lazily
    /// when read.
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.time_to_live = Some(duration);
        self
    }

    /// Builds the configured [`MemoryTier`].
    ///
    /// The clock is the tier's only source of time; tests pass a controlled
    /// clock to exercise expiry without sleeping.
    #[must_use]
    pub fn build(self, clock: Clock) -> MemoryTier<K, V>
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        MemoryTier::from_builder(&self, clock)
    }
}
