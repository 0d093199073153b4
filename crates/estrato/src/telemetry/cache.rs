// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry implementation and recording.

use std::time::Duration;

use arrayvec::ArrayVec;
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Gauge, Histogram, Meter},
};
use std::sync::Arc;

use crate::telemetry::{
    CacheActivity, CacheOperation, CacheTelemetry, attributes,
    metrics::{create_cache_size_gauge, create_event_counter, create_operation_duration_histogram},
};

/// Maximum attributes per event: cache name, tier, operation, activity.
const MAX_ATTRIBUTES: usize = 4;

type Attributes = ArrayVec<KeyValue, MAX_ATTRIBUTES>;

#[derive(Debug)]
pub(crate) struct CacheTelemetryInner {
    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(dead_code, reason = "only read when log emission is compiled in")
    )]
    logging_enabled: bool,
    event_counter: Option<Counter<u64>>,
    operation_duration: Option<Histogram<f64>>,
    cache_size: Option<Gauge<u64>>,
}

impl CacheTelemetry {
    /// Creates a new cache telemetry collector.
    ///
    /// # Arguments
    ///
    /// * `logging_enabled` - Emit a `tracing` event per recorded activity
    /// * `meter` - OpenTelemetry meter to record metrics against, if any
    #[must_use]
    pub fn new(logging_enabled: bool, meter: Option<&Meter>) -> Self {
        Self {
            inner: Arc::new(CacheTelemetryInner {
                logging_enabled,
                event_counter: meter.map(create_event_counter),
                operation_duration: meter.map(create_operation_duration_histogram),
                cache_size: meter.map(create_cache_size_gauge),
            }),
        }
    }

    /// Records one cache activity against a tier.
    #[inline]
    pub(crate) fn record(
        &self,
        cache_name: &'static str,
        tier_name: &'static str,
        operation: CacheOperation,
        activity: CacheActivity,
        duration: Option<Duration>,
    ) {
        let mut attrs = Attributes::new();
        attrs.push(KeyValue::new(attributes::CACHE_NAME, cache_name));
        attrs.push(KeyValue::new(attributes::TIER_NAME, tier_name));
        attrs.push(KeyValue::new(attributes::OPERATION_NAME, operation.as_str()));
        attrs.push(KeyValue::new(attributes::ACTIVITY_NAME, activity.as_str()));

        if let Some(counter) = &self.inner.event_counter {
            counter.add(1, &attrs);
        }
        if let (Some(duration), Some(histogram)) = (duration, &self.inner.operation_duration) {
            histogram.record(duration.as_secs_f64(), &attrs);
        }

        #[cfg(any(feature = "logs", test))]
        if self.inner.logging_enabled {
            Self::emit(cache_name, tier_name, operation, activity, duration);
        }
    }

    /// Records the current size of a tier.
    #[inline]
    pub(crate) fn record_size(&self, cache_name: &'static str, tier_name: &'static str, size: u64) {
        if let Some(gauge) = &self.inner.cache_size {
            let attrs = [
                KeyValue::new(attributes::CACHE_NAME, cache_name),
                KeyValue::new(attributes::TIER_NAME, tier_name),
            ];
            gauge.record(size, &attrs);
        }
    }

    #[cfg(any(feature = "logs", test))]
    fn emit(
        cache_name: &'static str,
        tier_name: &'static str,
        operation: CacheOperation,
        activity: CacheActivity,
        duration: Option<Duration>,
    ) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // The tracing level must be constant, so a macro selects it.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.tier = tier_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        match activity {
            CacheActivity::Error => emit_event!(warn),
            CacheActivity::Expired | CacheActivity::Invalidated | CacheActivity::Promoted | CacheActivity::PromotionDiscarded => {
                emit_event!(info);
            }
            CacheActivity::Hit | CacheActivity::Miss | CacheActivity::Inserted | CacheActivity::Ok => {
                emit_event!(debug);
            }
        }
    }
}
