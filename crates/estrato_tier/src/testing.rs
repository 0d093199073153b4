// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock tier implementation for testing.
//!
//! This module provides `MockTier`, a configurable in-memory store that
//! records all operations and supports failure injection for testing error
//! paths, health transitions, and fallback behavior.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::{CacheEntry, CacheTier, Error, TierCapabilities};

/// Recorded tier operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOp<K, V> {
    /// A get operation was performed with the given key.
    Get(K),
    /// A batch get operation was performed with the given keys.
    GetMany(Vec<K>),
    /// An insert operation was performed with the given key and entry.
    Insert {
        /// The key that was inserted.
        key: K,
        /// The cache entry that was inserted.
        entry: CacheEntry<V>,
    },
    /// A batch insert operation was performed with the given keys.
    InsertMany(Vec<K>),
    /// An invalidate operation was performed with the given key.
    Invalidate(K),
    /// A tag invalidation was performed with the given tag.
    InvalidateTag(String),
    /// A clear operation was performed.
    Clear,
    /// A liveness probe was performed.
    Probe,
}

type FailPredicate<K, V> = Box<dyn Fn(&TierOp<K, V>) -> bool + Send + Sync>;

/// A configurable mock tier for testing.
///
/// This tier stores values in memory and can be configured to fail operations
/// on demand, making it useful for testing error handling, health degradation
/// and tier fallback. All operations are recorded for later verification.
///
/// # Examples
///
/// ```no_run
/// use estrato_tier::{testing::{MockTier, TierOp}, CacheTier, CacheEntry};
///
/// # async fn example() {
/// let tier = MockTier::<String, i32>::new();
///
/// // Insert and retrieve
/// tier.insert(&"key".to_string(), CacheEntry::new(42)).await.unwrap();
/// let value = tier.get(&"key".to_string()).await.unwrap();
/// assert_eq!(*value.unwrap().value(), 42);
///
/// // Verify operations
/// assert_eq!(tier.operations(), vec![
///     TierOp::Insert { key: "key".to_string(), entry: CacheEntry::new(42) },
///     TierOp::Get("key".to_string()),
/// ]);
/// # }
/// ```
///
/// # Failure Injection
///
/// ```no_run
/// use estrato_tier::{testing::{MockTier, TierOp}, CacheTier, CacheEntry};
///
/// # async fn example() {
/// let tier: MockTier<String, i32> = MockTier::new();
///
/// // Fail all get operations
/// tier.fail_when(|op| matches!(op, TierOp::Get(_)));
/// assert!(tier.get(&"key".to_string()).await.is_err());
///
/// // Fail only specific keys
/// tier.fail_when(|op| matches!(op, TierOp::Get(k) if k == "forbidden"));
/// assert!(tier.get(&"forbidden".to_string()).await.is_err());
/// assert!(tier.get(&"allowed".to_string()).await.is_ok());
/// # }
/// ```
pub struct MockTier<K, V> {
    data: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
    operations: Arc<Mutex<Vec<TierOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
    capabilities: Arc<Mutex<TierCapabilities>>,
}

impl<K, V> std::fmt::Debug for MockTier<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTier")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<K, V> Clone for MockTier<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            capabilities: Arc::clone(&self.capabilities),
        }
    }
}

impl<K, V> Default for MockTier<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MockTier<K, V> {
    /// Creates a new empty mock tier.
    ///
    /// By default the mock advertises native tag support, so the orchestrator
    /// exercises the bulk-delete path; use
    /// [`set_capabilities`](Self::set_capabilities) to test emulated paths.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            capabilities: Arc::new(Mutex::new(TierCapabilities {
                native_ttl: false,
                native_tags: true,
                native_batch: true,
            })),
        }
    }

    /// Overrides the capabilities this mock advertises.
    pub fn set_capabilities(&self, capabilities: TierCapabilities) {
        *self.capabilities.lock() = capabilities;
    }
}

impl<K, V> MockTier<K, V>
where
    K: Eq + Hash,
{
    /// Creates a mock tier with pre-populated data.
    #[must_use]
    pub fn with_data(data: HashMap<K, CacheEntry<V>>) -> Self {
        let tier = Self::new();
        *tier.data.lock() = data;
        tier
    }

    /// Returns the number of entries in the tier.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the tier contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.lock().contains_key(key)
    }
}

impl<K, V> MockTier<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should
    /// fail. Failed operations do not mutate the stored data.
    ///
    /// # Examples
    ///
    /// ```
    /// use estrato_tier::testing::{MockTier, TierOp};
    ///
    /// let tier: MockTier<String, i32> = MockTier::new();
    ///
    /// // Fail all operations
    /// tier.fail_when(|_| true);
    ///
    /// // Fail only gets
    /// tier.fail_when(|op| matches!(op, TierOp::Get(_)));
    ///
    /// // Fail gets for a specific key
    /// tier.fail_when(|op| matches!(op, TierOp::Get(k) if k == "bad_key"));
    /// ```
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&TierOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<TierOp<K, V>> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: TierOp<K, V>) {
        self.operations.lock().push(op);
    }

    fn should_fail(&self, op: &TierOp<K, V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    fn run<T>(&self, op: TierOp<K, V>, action: impl FnOnce(&Self) -> T) -> Result<T, Error> {
        if self.should_fail(&op) {
            self.record(op);
            return Err(Error::from_message("mock: operation failed"));
        }
        self.record(op);
        Ok(action(self))
    }
}

impl<K, V> CacheTier<K, V> for MockTier<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.run(TierOp::Get(key.clone()), |tier| tier.data.lock().get(key).cloned())
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
        self.run(TierOp::GetMany(keys.to_vec()), |tier| {
            let data = tier.data.lock();
            keys.iter().map(|k| data.get(k).cloned()).collect()
        })
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.run(
            TierOp::Insert {
                key: key.clone(),
                entry: entry.clone(),
            },
            |tier| {
                tier.data.lock().insert(key.clone(), entry);
            },
        )
    }

    async fn insert_many(&self, entries: &[(K, CacheEntry<V>)]) -> Result<(), Error> {
        let keys: Vec<K> = entries.iter().map(|(k, _)| k.clone()).collect();
        self.run(TierOp::InsertMany(keys), |tier| {
            let mut data = tier.data.lock();
            for (key, entry) in entries {
                data.insert(key.clone(), entry.clone());
            }
        })
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.run(TierOp::Invalidate(key.clone()), |tier| {
            tier.data.lock().remove(key);
        })
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        self.run(TierOp::InvalidateTag(tag.to_string()), |tier| {
            let mut data = tier.data.lock();
            let keys: Vec<K> = data
                .iter()
                .filter(|(_, entry)| entry.tags().iter().any(|t| t == tag))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                data.remove(key);
            }
            keys.len() as u64
        })
    }

    async fn clear(&self) -> Result<(), Error> {
        self.run(TierOp::Clear, |tier| {
            tier.data.lock().clear();
        })
    }

    async fn probe(&self) -> Result<(), Error> {
        self.run(TierOp::Probe, |_| ())
    }

    fn capabilities(&self) -> TierCapabilities {
        *self.capabilities.lock()
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}
