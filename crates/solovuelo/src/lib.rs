// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Collapses concurrent async loads for the same key into a single flight.
//!
//! This crate provides [`SoloVuelo`], a duplicate-suppression mechanism for
//! expensive async operations. When several tasks request the same work
//! (identified by a key), only the first one (the "leader") executes the load
//! function; every other task (a "follower") attaches to the in-flight ticket
//! and receives a clone of the leader's result.
//!
//! At most one ticket exists per key at any instant: tickets are created with
//! insert-if-absent semantics under the group's lock and removed when the
//! flight completes. Results are delivered to every waiter - including error
//! results when `T` is a `Result` - but nothing is retained afterwards, so
//! the next caller for a completed key starts a fresh flight. That makes the
//! group suitable for cache population: failures propagate to all waiters
//! without being cached.
//!
//! # Example
//!
//! ```
//! use solovuelo::SoloVuelo;
//!
//! # futures::executor::block_on(async {
//! let group: SoloVuelo<String, String> = SoloVuelo::new();
//!
//! // Concurrent calls with the same key share a single execution.
//! let result = group.work(&"user:123".to_string(), || async {
//!     // Expensive load; runs once no matter how many callers attach.
//!     "expensive_result".to_string()
//! }).await;
//! assert_eq!(result, "expensive_result");
//! # });
//! ```
//!
//! # Cancellation and Panic Safety
//!
//! If the leader is cancelled or panics before storing a result, the next
//! waiting follower takes over and executes its own copy of the work. A
//! follower that attaches after the leader stored the result receives the
//! stored value without executing anything.

use std::{collections::HashMap, hash::Hash, sync::Arc, sync::Weak};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

/// A single in-flight load: the leader executes while holding the slot lock,
/// so followers block on the lock until a result is available.
struct Flight<T> {
    slot: AsyncMutex<Option<T>>,
}

impl<T> Flight<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: AsyncMutex::new(None),
        })
    }
}

/// Represents a class of work in which concurrent loads for the same key are
/// collapsed into one execution.
///
/// See the [crate-level documentation](crate) for semantics and examples.
pub struct SoloVuelo<K, T> {
    tickets: SyncMutex<HashMap<K, Weak<Flight<T>>>>,
}

impl<K, T> Default for SoloVuelo<K, T> {
    fn default() -> Self {
        Self {
            tickets: SyncMutex::new(HashMap::new()),
        }
    }
}

impl<K, T> std::fmt::Debug for SoloVuelo<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoloVuelo").finish_non_exhaustive()
    }
}

impl<K, T> SoloVuelo<K, T>
where
    K: Clone + Eq + Hash,
    T: Clone,
{
    /// Creates a new, empty group.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes `func` for `key`, suppressing duplicate concurrent executions.
    ///
    /// If no flight is active for `key`, the caller becomes the leader and
    /// runs `func`. Otherwise the caller waits for the active flight and
    /// receives a clone of its result; `func` is dropped unused. The ticket
    /// is removed once the result has been stored, so a call arriving after
    /// completion starts a new flight.
    pub async fn work<F, Fut>(&self, key: &K, func: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // Insert-if-absent under the table lock guarantees at most one live
        // ticket per key. The lock is released before any awaiting happens.
        let (flight, leader) = {
            let mut tickets = self.tickets.lock();
            match tickets.get(key).and_then(Weak::upgrade) {
                Some(flight) => (flight, false),
                None => {
                    let flight = Flight::new();
                    tickets.insert(key.clone(), Arc::downgrade(&flight));
                    (flight, true)
                }
            }
        };

        if leader {
            self.lead(key, &flight, func).await
        } else {
            self.follow(key, &flight, func).await
        }
    }

    /// Executes the work while holding the slot lock so that followers block
    /// until a result is stored.
    async fn lead<F, Fut>(&self, key: &K, flight: &Arc<Flight<T>>, func: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut slot = flight.slot.lock().await;

        // A promoted follower may have stored a result while we waited for
        // the lock; hand it out instead of executing twice.
        if let Some(value) = slot.as_ref() {
            return value.clone();
        }

        let value = func().await;
        *slot = Some(value.clone());
        drop(slot);

        self.retire(key, flight);
        value
    }

    async fn follow<F, Fut>(&self, key: &K, flight: &Arc<Flight<T>>, func: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        {
            let slot = flight.slot.lock().await;
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
        }

        // We acquired the lock and found no result: every leader was
        // cancelled or panicked before storing. Take over the work.
        self.lead(key, flight, func).await
    }

    /// Removes the ticket for `key`, but only if it still refers to this
    /// flight - a later caller may already have started a new generation.
    fn retire(&self, key: &K, flight: &Arc<Flight<T>>) {
        let mut tickets = self.tickets.lock();
        if let Some(current) = tickets.get(key)
            && std::ptr::eq(current.as_ptr(), Arc::as_ptr(flight))
        {
            tickets.remove(key);
        }
    }
}
