// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache builder: ordered tiers, validated configuration, background probing.

use std::{hash::Hash, time::Duration};

use tick::Clock;

use estrato_tier::{CacheTier, DynamicTier, DynamicTierExt as _};

use crate::{
    Cache,
    config::{CacheConfig, ConfigError},
    health::HealthMonitor,
    stack::{TierSlot, TierStack},
    stats::TierCounters,
};

use crate::telemetry::CacheTelemetry;

/// Builder for constructing a [`Cache`] over an ordered list of tiers.
///
/// Tiers are added in priority order: the first added tier is checked first
/// on reads and written synchronously on writes, so it should be the
/// in-process memory tier. Remaining tiers are fallbacks in the order given.
///
/// # Examples
///
/// ```
/// use estrato::Cache;
/// use std::time::Duration;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let cache = Cache::builder::<String, String>(clock)
///     .name("images")
///     .memory(10_000)
///     .default_ttl(Duration::from_secs(300))
///     .build()
///     .expect("configuration is valid");
/// ```
#[derive(Debug)]
pub struct CacheBuilder<K, V> {
    name: &'static str,
    clock: Clock,
    config: CacheConfig,
    tiers: Vec<(&'static str, DynamicTier<K, V>)>,
    telemetry: Option<CacheTelemetry>,
    background_probes: bool,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            name: "estrato",
            clock,
            config: CacheConfig::default(),
            tiers: Vec::new(),
            telemetry: None,
            background_probes: true,
        }
    }

    /// Sets the cache's name, used as its identity in telemetry output.
    ///
    /// Typical deployments run one cache per namespace ("images",
    /// "descriptions", ...), named accordingly.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Appends a tier at the next (lower) priority.
    #[must_use]
    pub fn tier(mut self, name: &'static str, tier: impl CacheTier<K, V> + 'static) -> Self {
        self.tiers.push((name, tier.into_dynamic()));
        self
    }

    /// Appends an in-process memory tier bounded to `max_entries`.
    ///
    /// This is normally the first tier: it has no external dependency, so the
    /// cache keeps answering even with every remote tier down.
    ///
    /// # Panics
    ///
    /// Panics if `max_entries` is 0.
    #[cfg(feature = "memory")]
    #[must_use]
    pub fn memory(self, max_entries: usize) -> Self
    where
        K: Hash,
    {
        let tier = estrato_memory::MemoryTier::with_capacity(self.clock.clone(), max_entries);
        self.tier("memory", tier)
    }

    /// Sets the TTL applied to entries that do not carry their own.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    /// Overrides the health tracking thresholds and probe cadence.
    #[must_use]
    pub fn health_policy(mut self, policy: crate::HealthPolicy) -> Self {
        self.config.health = policy;
        self
    }

    /// Sets the telemetry sink for logs and metrics.
    #[cfg(any(feature = "logs", feature = "metrics", test))]
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Enables or disables the background health prober. On by default.
    ///
    /// The prober needs an ambient async runtime; without one (plain
    /// executors, synchronous tools) probing can be driven manually via
    /// [`Cache::probe`].
    #[must_use]
    pub fn background_probes(mut self, enabled: bool) -> Self {
        self.background_probes = enabled;
        self
    }

    /// Builds the cache, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when no tier was configured, tier names
    /// collide, or a timing value is invalid.
    pub fn build(self) -> Result<Cache<K, V>, ConfigError> {
        self.config.validate()?;
        if self.tiers.is_empty() {
            return Err(ConfigError::new("at least one tier is required".to_string()));
        }
        for (index, (name, _)) in self.tiers.iter().enumerate() {
            if self.tiers[..index].iter().any(|(other, _)| other == name) {
                return Err(ConfigError::new(format!("duplicate tier name: {name}")));
            }
        }

        let slots = self
            .tiers
            .into_iter()
            .map(|(name, tier)| TierSlot {
                name,
                tier,
                health: HealthMonitor::new(self.config.health),
                counters: TierCounters::default(),
            })
            .collect();

        let stack = TierStack::new(self.name, slots, self.clock.clone(), self.config.default_ttl, self.telemetry);
        let cache = Cache::from_stack(stack);

        #[cfg(feature = "tokio")]
        if self.background_probes {
            spawn_prober(&cache, self.config.health.probe_interval, self.clock);
        }

        Ok(cache)
    }
}

/// Spawns the background probe loop if an async runtime is ambient.
///
/// The loop holds only a weak reference: dropping the last `Cache` handle
/// ends it on its next tick.
#[cfg(feature = "tokio")]
fn spawn_prober<K, V>(cache: &Cache<K, V>, interval: Duration, clock: Clock)
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    use futures::StreamExt as _;

    let Some(runtime) = crate::runtime::Runtime::current() else {
        return;
    };
    let inner = std::sync::Arc::downgrade(&cache.inner);

    runtime.spawn(async move {
        let mut timer = tick::PeriodicTimer::new(&clock, interval);
        while let Some(()) = timer.next().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.stack.probe_round().await;
        }
    });
}
