// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process LRU cache tier.
//!
//! The whole store lives behind one mutex: reads and writes are comparably
//! cheap, so finer-grained locking would buy peak throughput, not
//! correctness. No lock is ever held across an await point.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    hash::Hash,
    sync::Arc,
    time::{Duration, SystemTime},
};

use estrato_tier::{CacheEntry, CacheTier, Error, TierCapabilities};
use parking_lot::Mutex;
use tick::Clock;

use crate::builder::MemoryTierBuilder;

struct Slot<V> {
    entry: CacheEntry<V>,
    seq: u64,
}

struct State<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Access order: sequence -> key. The sequence is strictly monotonic, so
    /// the minimum is always the least recently used entry and untouched
    /// entries order by insertion.
    order: BTreeMap<u64, K>,
    tags: HashMap<String, HashSet<K>>,
    next_seq: u64,
    max_entries: Option<usize>,
    default_ttl: Option<Duration>,
}

impl<K, V> State<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: SystemTime) -> bool {
        let ttl = entry.ttl().or(self.default_ttl);
        if let Some(ttl) = ttl {
            match entry.cached_at() {
                Some(cached_at) => match now.duration_since(cached_at) {
                    Ok(elapsed) => elapsed > ttl,
                    Err(_) => true, // If the system time went backwards, consider it expired
                },
                None => true, // An entry with a TTL but no timestamp cannot be trusted
            }
        } else {
            false
        }
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        for tag in slot.entry.tags() {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        Some(slot.entry)
    }

    fn evict_lru(&mut self) {
        if let Some((_, key)) = self.order.pop_first() {
            if let Some(slot) = self.entries.remove(&key) {
                for tag in slot.entry.tags() {
                    if let Some(keys) = self.tags.get_mut(tag) {
                        keys.remove(&key);
                        if keys.is_empty() {
                            self.tags.remove(tag);
                        }
                    }
                }
            }
        }
    }

    fn get(&mut self, key: &K, now: SystemTime) -> Option<CacheEntry<V>> {
        let expired = match self.entries.get(key) {
            Some(slot) => self.is_expired(&slot.entry, now),
            None => return None,
        };
        if expired {
            self.remove(key);
            return None;
        }

        let seq = self.next_seq();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.seq);
        slot.seq = seq;
        self.order.insert(seq, key.clone());
        Some(slot.entry.clone())
    }

    fn insert(&mut self, key: &K, mut entry: CacheEntry<V>, now: SystemTime) {
        entry.ensure_cached_at(now);

        // Replacing never evicts; only growth past capacity does.
        if self.entries.contains_key(key) {
            self.remove(key);
        } else if let Some(max) = self.max_entries
            && self.entries.len() >= max
        {
            self.evict_lru();
        }

        let seq = self.next_seq();
        for tag in entry.tags() {
            self.tags.entry(tag.clone()).or_default().insert(key.clone());
        }
        self.order.insert(seq, key.clone());
        self.entries.insert(key.clone(), Slot { entry, seq });
    }

    fn invalidate_tag(&mut self, tag: &str) -> u64 {
        let Some(keys) = self.tags.remove(tag) else {
            return 0;
        };
        let mut removed = 0;
        for key in keys {
            if self.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.tags.clear();
    }
}

/// A bounded in-process cache tier with strict LRU eviction.
///
/// This tier provides:
/// - O(log n) reads and writes behind a single mutex
/// - LRU eviction once `max_entries` is reached, insertion-order tie-break
/// - Lazy TTL expiry on read (per-entry TTL overrides the tier default)
/// - A native `tag -> keys` index for bulk invalidation
///
/// Cloning is cheap and clones share the same storage.
///
/// # Examples
///
/// ```
/// use estrato_memory::MemoryTier;
/// use estrato_tier::{CacheEntry, CacheTier};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let tier = MemoryTier::<String, i32>::new(Clock::new_frozen());
///
/// tier.insert(&"key".to_string(), CacheEntry::new(42)).await?;
/// let value = tier.get(&"key".to_string()).await?;
/// assert_eq!(*value.unwrap().value(), 42);
/// # Ok::<(), estrato_tier::Error>(())
/// # });
/// ```
#[derive(Clone)]
pub struct MemoryTier<K, V> {
    state: Arc<Mutex<State<K, V>>>,
    clock: Clock,
}

impl<K, V> std::fmt::Debug for MemoryTier<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier").finish_non_exhaustive()
    }
}

impl<K, V> MemoryTier<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new unbounded memory tier.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::builder().build(clock)
    }

    /// Creates a new memory tier bounded to `max_entries`.
    ///
    /// # Panics
    ///
    /// Panics if `max_entries` is 0.
    #[must_use]
    pub fn with_capacity(clock: Clock, max_entries: usize) -> Self {
        Self::builder().max_entries(max_entries).build(clock)
    }

    /// Creates a new builder for configuring a memory tier.
    #[must_use]
    pub fn builder() -> MemoryTierBuilder<K, V> {
        MemoryTierBuilder::new()
    }

    pub(crate) fn from_builder(builder: &MemoryTierBuilder<K, V>, clock: Clock) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                tags: HashMap::new(),
                next_seq: 0,
                max_entries: builder.max_entries,
                default_ttl: builder.time_to_live,
            })),
            clock,
        }
    }
}

impl<K, V> CacheTier<K, V> for MemoryTier<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        let now = self.clock.system_time();
        Ok(self.state.lock().get(key, now))
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
        let now = self.clock.system_time();
        let mut state = self.state.lock();
        Ok(keys.iter().map(|key| state.get(key, now)).collect())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        let now = self.clock.system_time();
        self.state.lock().insert(key, entry, now);
        Ok(())
    }

    async fn insert_many(&self, entries: &[(K, CacheEntry<V>)]) -> Result<(), Error> {
        let now = self.clock.system_time();
        let mut state = self.state.lock();
        for (key, entry) in entries {
            state.insert(key, entry.clone(), now);
        }
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.state.lock().remove(key);
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        Ok(self.state.lock().invalidate_tag(tag))
    }

    async fn clear(&self) -> Result<(), Error> {
        self.state.lock().clear();
        Ok(())
    }

    async fn probe(&self) -> Result<(), Error> {
        Ok(())
    }

    fn capabilities(&self) -> TierCapabilities {
        TierCapabilities::all()
    }

    fn len(&self) -> Option<u64> {
        Some(self.state.lock().entries.len() as u64)
    }
}
