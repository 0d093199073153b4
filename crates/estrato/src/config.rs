// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration, validated at construction.
//!
//! Every recognized option is an explicit field with an explicit default;
//! invalid values fail the build instead of surfacing as odd runtime
//! behavior.

use std::time::Duration;

/// The cache configuration was rejected at construction time.
#[ohno::error]
#[display("invalid cache configuration: {reason}")]
pub struct ConfigError {
    /// Which validation failed.
    pub reason: String,
}

/// Thresholds and timings for per-tier health tracking.
///
/// A tier degrades after `degrade_after` consecutive failures, and a degraded
/// tier becomes unreachable after `unreachable_after` further consecutive
/// failures inside `failure_window`. Unreachable tiers are skipped on the hot
/// path and only revisited by the background prober every `probe_interval`.
///
/// # Examples
///
/// ```
/// use estrato::HealthPolicy;
/// use std::time::Duration;
///
/// let policy = HealthPolicy {
///     probe_interval: Duration::from_secs(10),
///     ..HealthPolicy::default()
/// };
/// assert_eq!(policy.degrade_after, 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive failures before a healthy tier is marked degraded.
    pub degrade_after: u32,
    /// Consecutive failures, within `failure_window`, before a degraded tier
    /// is marked unreachable.
    pub unreachable_after: u32,
    /// Failures older than this no longer count toward the unreachable
    /// transition.
    pub failure_window: Duration,
    /// How often the background prober revisits non-healthy tiers.
    pub probe_interval: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degrade_after: 1,
            unreachable_after: 3,
            failure_window: Duration::from_secs(30),
            probe_interval: Duration::from_secs(15),
        }
    }
}

/// Top-level cache options.
///
/// Tier-specific knobs (capacity, timeouts, retry budgets) live on the tier
/// builders; this struct holds what the orchestrator itself needs.
#[derive(Clone, Debug, Default)]
pub struct CacheConfig {
    /// TTL applied to entries that do not carry their own; `None` means
    /// entries without a TTL never expire.
    pub default_ttl: Option<Duration>,
    /// Health tracking thresholds and probe cadence.
    pub health: HealthPolicy,
}

impl CacheConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl == Some(Duration::ZERO) {
            return Err(ConfigError::new("default_ttl must be non-zero".to_string()));
        }
        if self.health.degrade_after == 0 {
            return Err(ConfigError::new("health.degrade_after must be at least 1".to_string()));
        }
        if self.health.unreachable_after == 0 {
            return Err(ConfigError::new("health.unreachable_after must be at least 1".to_string()));
        }
        if self.health.failure_window.is_zero() {
            return Err(ConfigError::new("health.failure_window must be non-zero".to_string()));
        }
        if self.health.probe_interval.is_zero() {
            return Err(ConfigError::new("health.probe_interval must be non-zero".to_string()));
        }
        Ok(())
    }
}
