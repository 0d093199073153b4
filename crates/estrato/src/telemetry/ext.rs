// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Extension traits for telemetry recording.

use std::time::Duration;

use tick::Clock;

use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};

/// Result of a timed async operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimedResult<R> {
    /// The result of the operation.
    pub result: R,
    /// The duration of the operation.
    pub duration: Duration,
}

/// Extension trait for timing async operations.
pub(crate) trait ClockExt {
    /// Times an async operation and returns both the result and elapsed duration.
    fn timed_async<F, R>(&self, f: F) -> impl Future<Output = TimedResult<R>>
    where
        F: Future<Output = R>;
}

impl ClockExt for Clock {
    async fn timed_async<F, R>(&self, f: F) -> TimedResult<R>
    where
        F: Future<Output = R>,
    {
        let start = self.instant();
        let result = f.await;
        TimedResult {
            result,
            duration: self.instant().saturating_duration_since(start),
        }
    }
}

/// Recording helpers that compile to no-ops when telemetry is disabled.
pub(crate) trait CacheTelemetryExt {
    /// Records a cache activity if telemetry is configured.
    fn record(
        &self,
        cache_name: &'static str,
        tier_name: &'static str,
        operation: CacheOperation,
        activity: CacheActivity,
        duration: Option<Duration>,
    );

    /// Records a tier's current size if telemetry is configured.
    fn record_size(&self, cache_name: &'static str, tier_name: &'static str, size: u64);
}

impl CacheTelemetryExt for Option<CacheTelemetry> {
    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(unused_variables, reason = "no-op when telemetry is disabled")
    )]
    fn record(
        &self,
        cache_name: &'static str,
        tier_name: &'static str,
        operation: CacheOperation,
        activity: CacheActivity,
        duration: Option<Duration>,
    ) {
        #[cfg(any(feature = "logs", feature = "metrics", test))]
        if let Some(telemetry) = self {
            telemetry.record(cache_name, tier_name, operation, activity, duration);
        }
    }

    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(unused_variables, reason = "no-op when telemetry is disabled")
    )]
    fn record_size(&self, cache_name: &'static str, tier_name: &'static str, size: u64) {
        #[cfg(any(feature = "logs", feature = "metrics", test))]
        if let Some(telemetry) = self {
            telemetry.record_size(cache_name, tier_name, size);
        }
    }
}
