// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Metric instrument definitions.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};

pub(crate) fn create_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("cache.events")
        .with_description("Count of cache events by tier, operation and activity")
        .build()
}

pub(crate) fn create_operation_duration_histogram(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("cache.operation.duration")
        .with_description("Duration of cache tier operations")
        .with_unit("s")
        .build()
}

pub(crate) fn create_cache_size_gauge(meter: &Meter) -> Gauge<u64> {
    meter
        .u64_gauge("cache.size")
        .with_description("Number of entries per cache tier")
        .build()
}
