// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Always-on per-tier statistics.
//!
//! Counters are plain atomics so the hot path pays a few relaxed increments;
//! `stats()` takes an owned snapshot suitable for a monitoring endpoint.
//! OpenTelemetry export is a separate, feature-gated concern (see the
//! `telemetry` module).

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use crate::health::Health;

#[derive(Debug, Default)]
pub(crate) struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    promotions: AtomicU64,
    inserts: AtomicU64,
}

impl TierCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_promotion(&self) {
        self.promotions.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Relaxed);
    }

    pub(crate) fn snapshot(&self, name: &'static str, health: Health, entries: Option<u64>) -> TierStats {
        TierStats {
            name,
            health,
            hits: self.hits.load(Relaxed),
            misses: self.misses.load(Relaxed),
            errors: self.errors.load(Relaxed),
            promotions: self.promotions.load(Relaxed),
            inserts: self.inserts.load(Relaxed),
            entries,
        }
    }
}

/// A point-in-time view of one tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierStats {
    /// The tier's configured name.
    pub name: &'static str,
    /// Current health state.
    pub health: Health,
    /// Reads served from this tier.
    pub hits: u64,
    /// Reads this tier could not serve (absent or expired).
    pub misses: u64,
    /// Operations that failed against this tier.
    pub errors: u64,
    /// Entries copied into this tier from a lower-priority tier.
    pub promotions: u64,
    /// Successful writes into this tier.
    pub inserts: u64,
    /// Entries currently held, for tiers that track size.
    pub entries: Option<u64>,
}

/// A point-in-time view of the whole cache, one element per tier in priority
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    /// Per-tier statistics, highest priority first.
    pub tiers: Vec<TierStats>,
}

impl CacheStats {
    /// Looks up one tier's statistics by name.
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&TierStats> {
        self.tiers.iter().find(|tier| tier.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let counters = TierCounters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        counters.record_error();
        counters.record_promotion();
        counters.record_insert();

        let stats = counters.snapshot("memory", Health::Healthy, Some(2));
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.promotions, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.entries, Some(2));
    }

    #[test]
    fn tier_lookup_by_name() {
        let stats = CacheStats {
            tiers: vec![
                TierCounters::default().snapshot("memory", Health::Healthy, Some(0)),
                TierCounters::default().snapshot("remote", Health::Degraded, None),
            ],
        };

        assert_eq!(stats.tier("remote").map(|t| t.health), Some(Health::Degraded));
        assert!(stats.tier("absent").is_none());
    }
}
