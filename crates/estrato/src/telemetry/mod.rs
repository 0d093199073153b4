// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry integration.
//!
//! This module records cache operations as structured `tracing` events (the
//! `logs` feature) and OpenTelemetry metrics (the `metrics` feature). With
//! neither feature enabled, recording compiles to a no-op; the always-on
//! statistics snapshot lives in the `stats` module instead.

#[cfg(any(feature = "logs", feature = "metrics", test))]
use cache::CacheTelemetryInner;
#[cfg(any(feature = "logs", feature = "metrics", test))]
use std::sync::Arc;

pub(crate) mod attributes;
#[cfg(any(feature = "logs", feature = "metrics", test))]
pub(crate) mod cache;
pub(crate) mod ext;
#[cfg(any(feature = "logs", feature = "metrics", test))]
pub(crate) mod metrics;

/// Cache telemetry provider.
///
/// Wraps the configured log and metric sinks; construct one and pass it to
/// the cache builder via `.telemetry()`. All recording goes through cheap
/// shared state, so cloning is inexpensive.
#[derive(Clone, Debug)]
pub struct CacheTelemetry {
    #[cfg(any(feature = "logs", feature = "metrics", test))]
    inner: Arc<CacheTelemetryInner>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheOperation {
    Get,
    Insert,
    Invalidate,
    InvalidateTag,
    Clear,
    Probe,
}

impl CacheOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Insert => "cache.insert",
            Self::Invalidate => "cache.invalidate",
            Self::InvalidateTag => "cache.invalidate_tag",
            Self::Clear => "cache.clear",
            Self::Probe => "cache.probe",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheActivity {
    Hit,
    Expired,
    Miss,
    Inserted,
    Invalidated,
    Promoted,
    PromotionDiscarded,
    Ok,
    Error,
}

impl CacheActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Expired => "cache.expired",
            Self::Miss => "cache.miss",
            Self::Inserted => "cache.inserted",
            Self::Invalidated => "cache.invalidated",
            Self::Promoted => "cache.promoted",
            Self::PromotionDiscarded => "cache.promotion_discarded",
            Self::Ok => "cache.ok",
            Self::Error => "cache.error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_operation_as_str() {
        assert_eq!(CacheOperation::Get.as_str(), "cache.get");
        assert_eq!(CacheOperation::Insert.as_str(), "cache.insert");
        assert_eq!(CacheOperation::Invalidate.as_str(), "cache.invalidate");
        assert_eq!(CacheOperation::InvalidateTag.as_str(), "cache.invalidate_tag");
        assert_eq!(CacheOperation::Clear.as_str(), "cache.clear");
        assert_eq!(CacheOperation::Probe.as_str(), "cache.probe");
    }

    #[test]
    fn cache_activity_as_str() {
        assert_eq!(CacheActivity::Hit.as_str(), "cache.hit");
        assert_eq!(CacheActivity::Expired.as_str(), "cache.expired");
        assert_eq!(CacheActivity::Miss.as_str(), "cache.miss");
        assert_eq!(CacheActivity::Inserted.as_str(), "cache.inserted");
        assert_eq!(CacheActivity::Invalidated.as_str(), "cache.invalidated");
        assert_eq!(CacheActivity::Promoted.as_str(), "cache.promoted");
        assert_eq!(CacheActivity::PromotionDiscarded.as_str(), "cache.promotion_discarded");
        assert_eq!(CacheActivity::Ok.as_str(), "cache.ok");
        assert_eq!(CacheActivity::Error.as_str(), "cache.error");
    }
}
