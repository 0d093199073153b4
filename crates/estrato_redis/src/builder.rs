// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring Redis-backed tiers.

use std::marker::PhantomData;
use std::time::Duration;

use estrato_tier::{Error, Result};
use tick::Clock;

use crate::tier::RedisTier;

/// Builder for configuring a [`RedisTier`].
///
/// # Examples
///
/// ```no_run
/// use estrato_redis::RedisTier;
/// use std::time::Duration;
/// use tick::Clock;
///
/// # fn example(clock: Clock) -> Result<(), estrato_tier::Error> {
/// let tier: RedisTier<String, String> = RedisTier::builder("redis://127.0.0.1/")
///     .namespace("images")
///     .op_timeout(Duration::from_secs(2))
///     .retries(3)
///     .build(clock)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RedisTierBuilder<K, V> {
    pub(crate) url: String,
    pub(crate) namespace: String,
    pub(crate) op_timeout: Duration,
    pub(crate) retries: u32,
    pub(crate) initial_backoff: Duration,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> RedisTierBuilder<K, V> {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: "estrato".to_string(),
            op_timeout: Duration::from_secs(2),
            retries: 3,
            initial_backoff: Duration::from_secs(1),
            _phantom: PhantomData,
        }
    }

    /// Sets the namespace prefixed to every key this tier touches.
    ///
    /// Namespacing keeps independent caches from colliding on a shared
    /// service and lets `clear` remove only this cache's keys.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the per-command timeout. Defaults to 2 seconds.
    ///
    /// A command that exceeds the timeout is abandoned and counts as a
    /// failure against the retry budget.
    #[must_use]
    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Sets the total number of attempts per operation. Defaults to 3.
    ///
    /// # Panics
    ///
    /// Panics if `retries` is 0.
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        assert!(retries > 0, "retries must be at least 1");
        self.retries = retries;
        self
    }

    /// Sets the delay before the first retry. Defaults to 1 second.
    ///
    /// The delay doubles after each failed attempt (1s, 2s, 4s, ...).
    #[must_use]
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Builds the configured [`RedisTier`].
    ///
    /// The connection is not established here; it is opened lazily on first
    /// use so that constructing a cache never blocks on the network.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection URL cannot be parsed.
    pub fn build(self, clock: Clock) -> Result<RedisTier<K, V>> {
        let client = redis::Client::open(self.url.as_str()).map_err(Error::from_message)?;
        Ok(RedisTier::from_builder(&self, client, clock))
    }
}
