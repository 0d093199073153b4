// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The tier orchestrator: one logical cache over an ordered list of stores.
//!
//! Reads walk the tiers in priority order and promote hits upward; writes go
//! to the first tier synchronously (read-your-writes) and fan out best-effort
//! to the rest; tag invalidation uses native bulk deletes where a tier
//! supports them and the side index everywhere else. A tier failing never
//! fails the operation as long as any tier succeeds - failures feed health
//! tracking and statistics instead.

use std::{collections::HashMap, hash::Hash, time::Duration};

use parking_lot::Mutex;
use tick::Clock;

use estrato_tier::{CacheEntry, CacheTier, DynamicTier, Error};

use crate::{
    error::{all_tiers_unavailable, is_serialization_error},
    health::{Health, HealthMonitor},
    stats::{CacheStats, TierCounters},
    tags::TagIndex,
    telemetry::{
        CacheActivity, CacheOperation, CacheTelemetry,
        ext::{CacheTelemetryExt as _, ClockExt as _},
    },
};

/// One store in the hierarchy: the tier itself plus its health state and
/// counters. Position in the stack's `slots` vector is its priority.
pub(crate) struct TierSlot<K, V> {
    pub(crate) name: &'static str,
    pub(crate) tier: DynamicTier<K, V>,
    pub(crate) health: HealthMonitor,
    pub(crate) counters: TierCounters,
}

impl<K, V> std::fmt::Debug for TierSlot<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierSlot")
            .field("name", &self.name)
            .field("health", &self.health.current())
            .finish_non_exhaustive()
    }
}

struct GuardSlot {
    readers: u32,
    dirty: bool,
}

/// Tracks keys with promotions in flight so a concurrent write wins the race.
///
/// A read registers its key before touching any tier; a completing write
/// stamps every registered guard for that key. When the read releases its
/// guard and finds it stamped, it discards whatever it promoted instead of
/// leaving a possibly stale copy in the upper tiers.
pub(crate) struct PromotionGuards<K> {
    inner: Mutex<HashMap<K, GuardSlot>>,
}

impl<K> std::fmt::Debug for PromotionGuards<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromotionGuards").finish_non_exhaustive()
    }
}

impl<K> PromotionGuards<K>
where
    K: Clone + Eq + Hash,
{
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, key: &K) {
        let mut inner = self.inner.lock();
        inner
            .entry(key.clone())
            .and_modify(|slot| slot.readers += 1)
            .or_insert(GuardSlot { readers: 1, dirty: false });
    }

    fn stamp(&self, key: &K) {
        if let Some(slot) = self.inner.lock().get_mut(key) {
            slot.dirty = true;
        }
    }

    /// Drops one reader's registration; returns whether a write raced it.
    fn release(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let Some(slot) = inner.get_mut(key) else {
            return false;
        };
        slot.readers -= 1;
        let dirty = slot.dirty;
        if slot.readers == 0 {
            inner.remove(key);
        }
        dirty
    }
}

/// The ordered tier hierarchy and everything the orchestrator tracks for it.
#[derive(Debug)]
pub(crate) struct TierStack<K, V> {
    pub(crate) name: &'static str,
    pub(crate) slots: Vec<TierSlot<K, V>>,
    pub(crate) clock: Clock,
    pub(crate) default_ttl: Option<Duration>,
    pub(crate) tags: TagIndex<K>,
    pub(crate) promotions: PromotionGuards<K>,
    pub(crate) telemetry: Option<CacheTelemetry>,
}

impl<K, V> TierStack<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        name: &'static str,
        slots: Vec<TierSlot<K, V>>,
        clock: Clock,
        default_ttl: Option<Duration>,
        telemetry: Option<CacheTelemetry>,
    ) -> Self {
        Self {
            name,
            slots,
            clock,
            default_ttl,
            tags: TagIndex::new(),
            promotions: PromotionGuards::new(),
            telemetry,
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
        let ttl = entry.ttl().or(self.default_ttl);
        if let Some(ttl) = ttl {
            match entry.cached_at() {
                Some(cached_at) => match self.clock.system_time().duration_since(cached_at) {
                    Ok(elapsed) => elapsed > ttl,
                    Err(_) => true, // If the system time went backwards, consider it expired
                },
                None => true, // An entry with a TTL but no timestamp cannot be trusted
            }
        } else {
            false
        }
    }

    fn note_success(&self, slot: &TierSlot<K, V>) {
        let transition = slot.health.record_success();
        self.log_transition(slot.name, transition);
    }

    fn note_failure(&self, slot: &TierSlot<K, V>, error: &Error, operation: CacheOperation, duration: Duration) {
        slot.counters.record_error();
        let transition = slot.health.record_failure(self.clock.instant());
        self.telemetry
            .record(self.name, slot.name, operation, CacheActivity::Error, Some(duration));
        self.log_failure(slot.name, error);
        self.log_transition(slot.name, transition);
    }

    #[cfg(feature = "logs")]
    fn log_failure(&self, tier: &'static str, error: &Error) {
        tracing::warn!(cache = self.name, tier, error = %error, "cache tier operation failed");
    }

    #[cfg(not(feature = "logs"))]
    fn log_failure(&self, _tier: &'static str, _error: &Error) {}

    #[cfg(feature = "logs")]
    fn log_transition(&self, tier: &'static str, transition: Option<(Health, Health)>) {
        if let Some((from, to)) = transition {
            tracing::info!(
                cache = self.name,
                tier,
                from = from.as_str(),
                to = to.as_str(),
                "cache tier health changed"
            );
        }
    }

    #[cfg(not(feature = "logs"))]
    fn log_transition(&self, _tier: &'static str, _transition: Option<(Health, Health)>) {}

    /// Walks the tiers in priority order and returns the first live hit.
    async fn lookup(&self, key: &K) -> Result<Option<(usize, CacheEntry<V>)>, Error> {
        let mut attempted = 0u32;
        let mut failed = 0u32;

        for (index, slot) in self.slots.iter().enumerate() {
            if !slot.health.allows_hot_path() {
                continue;
            }
            attempted += 1;

            let timed = self.clock.timed_async(slot.tier.get(key)).await;
            match timed.result {
                Ok(Some(entry)) => {
                    self.note_success(slot);
                    if self.is_expired(&entry) {
                        slot.counters.record_miss();
                        self.telemetry
                            .record(self.name, slot.name, CacheOperation::Get, CacheActivity::Expired, Some(timed.duration));
                        continue;
                    }
                    slot.counters.record_hit();
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Get, CacheActivity::Hit, Some(timed.duration));
                    return Ok(Some((index, entry)));
                }
                Ok(None) => {
                    self.note_success(slot);
                    slot.counters.record_miss();
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Get, CacheActivity::Miss, Some(timed.duration));
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(slot, &error, CacheOperation::Get, timed.duration);
                }
            }
        }

        if attempted == 0 || failed == attempted {
            return Err(all_tiers_unavailable());
        }
        Ok(None)
    }

    /// Copies a hit into every higher-priority tier that missed; returns the
    /// indexes that received it.
    async fn promote(&self, key: &K, entry: &CacheEntry<V>, found_at: usize) -> Vec<usize> {
        let mut promoted = Vec::new();
        for (index, slot) in self.slots[..found_at].iter().enumerate() {
            if !slot.health.allows_hot_path() {
                continue;
            }
            // The entry keeps its original timestamp, so promotion never
            // extends an entry's lifetime.
            let timed = self.clock.timed_async(slot.tier.insert(key, entry.clone())).await;
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    slot.counters.record_promotion();
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Insert, CacheActivity::Promoted, Some(timed.duration));
                    promoted.push(index);
                }
                Err(error) => self.note_failure(slot, &error, CacheOperation::Insert, timed.duration),
            }
        }
        promoted
    }

    /// Removes the copies a stale promotion just wrote.
    ///
    /// The concurrent write that stamped the guard wrote the new value to
    /// every healthy tier itself, so dropping our copies cannot lose it -
    /// only the stale value we were about to resurrect.
    async fn discard_promotions(&self, key: &K, promoted: &[usize]) {
        for &index in promoted {
            let slot = &self.slots[index];
            let timed = self.clock.timed_async(slot.tier.invalidate(key)).await;
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    self.telemetry.record(
                        self.name,
                        slot.name,
                        CacheOperation::Invalidate,
                        CacheActivity::PromotionDiscarded,
                        Some(timed.duration),
                    );
                }
                Err(error) => self.note_failure(slot, &error, CacheOperation::Invalidate, timed.duration),
            }
        }
    }

    pub(crate) async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.promotions.register(key);

        let (outcome, promoted) = match self.lookup(key).await {
            Ok(Some((0, entry))) => (Ok(Some(entry)), Vec::new()),
            Ok(Some((found_at, entry))) => {
                let promoted = self.promote(key, &entry, found_at).await;
                (Ok(Some(entry)), promoted)
            }
            Ok(None) => (Ok(None), Vec::new()),
            Err(error) => (Err(error), Vec::new()),
        };

        if self.promotions.release(key) && !promoted.is_empty() {
            self.discard_promotions(key, &promoted).await;
        }
        outcome
    }

    pub(crate) async fn insert(&self, key: &K, mut entry: CacheEntry<V>) -> Result<(), Error> {
        entry.ensure_cached_at(self.clock.system_time());
        if entry.ttl().is_none()
            && let Some(ttl) = self.default_ttl
        {
            entry.set_ttl(ttl);
        }

        let mut attempted = 0u32;
        let mut failed = 0u32;
        let mut serialization_failure = None;

        // The first tier is written synchronously and unconditionally: it is
        // the read-your-writes anchor.
        if let Some(first) = self.slots.first() {
            attempted += 1;
            let timed = self.clock.timed_async(first.tier.insert(key, entry.clone())).await;
            match timed.result {
                Ok(()) => {
                    self.note_success(first);
                    first.counters.record_insert();
                    self.telemetry
                        .record(self.name, first.name, CacheOperation::Insert, CacheActivity::Inserted, Some(timed.duration));
                    if let Some(size) = first.tier.len() {
                        self.telemetry.record_size(self.name, first.name, size);
                    }
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(first, &error, CacheOperation::Insert, timed.duration);
                    if is_serialization_error(&error) {
                        serialization_failure = Some(error);
                    }
                }
            }
        }

        // Remaining tiers are best effort and written concurrently.
        let writes: Vec<_> = self
            .slots
            .iter()
            .skip(1)
            .filter(|slot| slot.health.allows_hot_path())
            .map(|slot| {
                let entry = entry.clone();
                async move { (slot, self.clock.timed_async(slot.tier.insert(key, entry)).await) }
            })
            .collect();
        for (slot, timed) in futures::future::join_all(writes).await {
            attempted += 1;
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    slot.counters.record_insert();
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Insert, CacheActivity::Inserted, Some(timed.duration));
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(slot, &error, CacheOperation::Insert, timed.duration);
                    if is_serialization_error(&error) {
                        serialization_failure = Some(error);
                    }
                }
            }
        }

        // Index maintenance and the write stamp happen at completion time:
        // last writer by completion order wins against in-flight promotions.
        self.tags.update(key, entry.tags());
        self.promotions.stamp(key);

        if let Some(error) = serialization_failure {
            // A value that cannot be serialized is a caller bug; fail loudly.
            return Err(error);
        }
        if attempted > 0 && failed == attempted {
            return Err(all_tiers_unavailable());
        }
        Ok(())
    }

    pub(crate) async fn invalidate(&self, key: &K) -> Result<(), Error> {
        let mut attempted = 0u32;
        let mut failed = 0u32;

        let deletes: Vec<_> = self
            .slots
            .iter()
            .filter(|slot| slot.health.allows_hot_path())
            .map(|slot| async move { (slot, self.clock.timed_async(slot.tier.invalidate(key)).await) })
            .collect();
        for (slot, timed) in futures::future::join_all(deletes).await {
            attempted += 1;
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Invalidate, CacheActivity::Invalidated, Some(timed.duration));
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(slot, &error, CacheOperation::Invalidate, timed.duration);
                }
            }
        }

        self.tags.remove_key(key);
        // A delete is a write of absence; in-flight promotions must not
        // resurrect the removed value.
        self.promotions.stamp(key);

        if attempted > 0 && failed == attempted {
            return Err(all_tiers_unavailable());
        }
        Ok(())
    }

    pub(crate) async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        let keys = self.tags.take(tag);
        let mut removed = keys.len() as u64;

        for slot in &self.slots {
            if !slot.health.allows_hot_path() {
                continue;
            }
            if slot.tier.capabilities().native_tags {
                let timed = self.clock.timed_async(slot.tier.invalidate_tag(tag)).await;
                match timed.result {
                    Ok(count) => {
                        self.note_success(slot);
                        self.telemetry.record(
                            self.name,
                            slot.name,
                            CacheOperation::InvalidateTag,
                            CacheActivity::Invalidated,
                            Some(timed.duration),
                        );
                        // A shared store may hold tagged keys other processes
                        // wrote; report whichever count saw more.
                        removed = removed.max(count);
                    }
                    Err(error) => self.note_failure(slot, &error, CacheOperation::InvalidateTag, timed.duration),
                }
            } else {
                for key in &keys {
                    let timed = self.clock.timed_async(slot.tier.invalidate(key)).await;
                    match timed.result {
                        Ok(()) => self.note_success(slot),
                        Err(error) => self.note_failure(slot, &error, CacheOperation::Invalidate, timed.duration),
                    }
                }
            }
        }

        for key in &keys {
            self.promotions.stamp(key);
        }
        Ok(removed)
    }

    pub(crate) async fn clear(&self) -> Result<(), Error> {
        let mut failed = 0u32;

        // Administrative operation: every tier is attempted, whatever its health.
        let clears: Vec<_> = self
            .slots
            .iter()
            .map(|slot| async move { (slot, self.clock.timed_async(slot.tier.clear()).await) })
            .collect();
        for (slot, timed) in futures::future::join_all(clears).await {
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Clear, CacheActivity::Ok, Some(timed.duration));
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(slot, &error, CacheOperation::Clear, timed.duration);
                }
            }
        }

        self.tags.clear();

        if !self.slots.is_empty() && failed == self.slots.len() as u32 {
            return Err(all_tiers_unavailable());
        }
        Ok(())
    }

    pub(crate) async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        for key in keys {
            self.promotions.register(key);
        }

        let outcome = self.lookup_many(keys).await;

        let result = match outcome {
            Ok((values, found_at)) => {
                let promoted = self.promote_many(keys, &values, &found_at).await;
                Ok((values, promoted))
            }
            Err(error) => Err(error),
        };

        for (index, key) in keys.iter().enumerate() {
            let dirty = self.promotions.release(key);
            if !dirty {
                continue;
            }
            if let Ok((_, promoted)) = &result
                && let Some(tiers) = promoted.get(index)
                && !tiers.is_empty()
            {
                self.discard_promotions(key, tiers).await;
            }
        }

        result.map(|(values, _)| values)
    }

    /// Batch counterpart of [`lookup`](Self::lookup): each tier is asked once
    /// for all still-missing keys.
    #[expect(clippy::type_complexity, reason = "internal pairing of values with their source tier")]
    async fn lookup_many(&self, keys: &[K]) -> Result<(Vec<Option<CacheEntry<V>>>, Vec<Option<usize>>), Error> {
        let mut values: Vec<Option<CacheEntry<V>>> = vec![None; keys.len()];
        let mut found_at: Vec<Option<usize>> = vec![None; keys.len()];
        let mut missing: Vec<usize> = (0..keys.len()).collect();
        let mut attempted = 0u32;
        let mut failed = 0u32;

        for (tier_index, slot) in self.slots.iter().enumerate() {
            if missing.is_empty() {
                break;
            }
            if !slot.health.allows_hot_path() {
                continue;
            }
            attempted += 1;

            let subset: Vec<K> = missing.iter().map(|&i| keys[i].clone()).collect();
            let timed = self.clock.timed_async(slot.tier.get_many(&subset)).await;
            match timed.result {
                Ok(found) => {
                    self.note_success(slot);
                    let mut still_missing = Vec::new();
                    for (position, maybe) in found.into_iter().enumerate() {
                        let key_index = missing[position];
                        match maybe {
                            Some(entry) if !self.is_expired(&entry) => {
                                slot.counters.record_hit();
                                values[key_index] = Some(entry);
                                found_at[key_index] = Some(tier_index);
                            }
                            _ => {
                                slot.counters.record_miss();
                                still_missing.push(key_index);
                            }
                        }
                    }
                    missing = still_missing;
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(slot, &error, CacheOperation::Get, timed.duration);
                }
            }
        }

        if attempted == 0 || failed == attempted {
            return Err(all_tiers_unavailable());
        }
        Ok((values, found_at))
    }

    /// Promotes batch hits into the tiers above their source; returns, per
    /// key, the tier indexes that received a copy.
    async fn promote_many(&self, keys: &[K], values: &[Option<CacheEntry<V>>], found_at: &[Option<usize>]) -> Vec<Vec<usize>> {
        let mut promoted: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
        let deepest = found_at.iter().flatten().max().copied().unwrap_or(0);

        for (tier_index, slot) in self.slots[..deepest].iter().enumerate() {
            if !slot.health.allows_hot_path() {
                continue;
            }

            let batch: Vec<(K, CacheEntry<V>)> = found_at
                .iter()
                .enumerate()
                .filter(|(_, source)| source.is_some_and(|source| source > tier_index))
                .filter_map(|(key_index, _)| {
                    values[key_index]
                        .as_ref()
                        .map(|entry| (keys[key_index].clone(), entry.clone()))
                })
                .collect();
            if batch.is_empty() {
                continue;
            }

            let timed = self.clock.timed_async(slot.tier.insert_many(&batch)).await;
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Insert, CacheActivity::Promoted, Some(timed.duration));
                    for (key_index, source) in found_at.iter().enumerate() {
                        if source.is_some_and(|source| source > tier_index) {
                            slot.counters.record_promotion();
                            promoted[key_index].push(tier_index);
                        }
                    }
                }
                Err(error) => self.note_failure(slot, &error, CacheOperation::Insert, timed.duration),
            }
        }
        promoted
    }

    pub(crate) async fn insert_many(&self, mut entries: Vec<(K, CacheEntry<V>)>) -> Result<(), Error> {
        if entries.is_empty() {
            return Ok(());
        }
        let now = self.clock.system_time();
        for (_, entry) in &mut entries {
            entry.ensure_cached_at(now);
            if entry.ttl().is_none()
                && let Some(ttl) = self.default_ttl
            {
                entry.set_ttl(ttl);
            }
        }

        let mut attempted = 0u32;
        let mut failed = 0u32;
        let mut serialization_failure = None;

        if let Some(first) = self.slots.first() {
            attempted += 1;
            let timed = self.clock.timed_async(first.tier.insert_many(&entries)).await;
            match timed.result {
                Ok(()) => {
                    self.note_success(first);
                    first.counters.record_insert();
                    self.telemetry
                        .record(self.name, first.name, CacheOperation::Insert, CacheActivity::Inserted, Some(timed.duration));
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(first, &error, CacheOperation::Insert, timed.duration);
                    if is_serialization_error(&error) {
                        serialization_failure = Some(error);
                    }
                }
            }
        }

        let writes: Vec<_> = self
            .slots
            .iter()
            .skip(1)
            .filter(|slot| slot.health.allows_hot_path())
            .map(|slot| {
                let entries = &entries;
                async move { (slot, self.clock.timed_async(slot.tier.insert_many(entries)).await) }
            })
            .collect();
        for (slot, timed) in futures::future::join_all(writes).await {
            attempted += 1;
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    slot.counters.record_insert();
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Insert, CacheActivity::Inserted, Some(timed.duration));
                }
                Err(error) => {
                    failed += 1;
                    self.note_failure(slot, &error, CacheOperation::Insert, timed.duration);
                    if is_serialization_error(&error) {
                        serialization_failure = Some(error);
                    }
                }
            }
        }

        for (key, entry) in &entries {
            self.tags.update(key, entry.tags());
            self.promotions.stamp(key);
        }

        if let Some(error) = serialization_failure {
            return Err(error);
        }
        if attempted > 0 && failed == attempted {
            return Err(all_tiers_unavailable());
        }
        Ok(())
    }

    /// One background probe pass: revisit every non-healthy tier.
    pub(crate) async fn probe_round(&self) {
        for slot in &self.slots {
            if slot.health.current() == Health::Healthy {
                continue;
            }
            let timed = self.clock.timed_async(slot.tier.probe()).await;
            match timed.result {
                Ok(()) => {
                    self.note_success(slot);
                    self.telemetry
                        .record(self.name, slot.name, CacheOperation::Probe, CacheActivity::Ok, Some(timed.duration));
                }
                Err(error) => self.note_failure(slot, &error, CacheOperation::Probe, timed.duration),
            }
        }
        self.tags.sweep();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            tiers: self
                .slots
                .iter()
                .map(|slot| slot.counters.snapshot(slot.name, slot.health.current(), slot.tier.len()))
                .collect(),
        }
    }
}
