// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Fault-tolerant multi-tier caching with health tracking, stampede
//! suppression, and tag invalidation.
//!
//! estrato composes an ordered list of cache stores - an in-process LRU
//! memory tier, Redis-backed remote tiers, anything implementing
//! [`CacheTier`] - into one logical [`Cache`]:
//!
//! - **Read-through with promotion**: reads walk the tiers in priority
//!   order; a hit found below the first tier is copied upward so the next
//!   read is served faster.
//! - **Write-through**: writes land in the first tier synchronously
//!   (read-your-writes within the process) and fan out best-effort to the
//!   rest.
//! - **Health tracking**: each tier runs an independent
//!   healthy/degraded/unreachable state machine; unreachable tiers are
//!   skipped on the hot path and revisited by a background prober. A tier
//!   being down degrades the cache, never the application.
//! - **Stampede suppression**: concurrent [`Cache::get_or_insert`] calls for
//!   the same missing key share a single load.
//! - **Tag invalidation**: entries carry tags; [`Cache::invalidate_tag`]
//!   removes every entry with a tag across all tiers, natively where
//!   supported and via a side index elsewhere.
//!
//! # Examples
//!
//! ## Basic In-Memory Cache
//!
//! ```
//! use estrato::{Cache, CacheEntry};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let clock = Clock::new_frozen();
//! let cache = Cache::builder::<String, i32>(clock)
//!     .memory(1000)
//!     .build()?;
//!
//! cache.insert(&"key".to_string(), CacheEntry::new(42)).await?;
//! let value = cache.get(&"key".to_string()).await?;
//! assert_eq!(*value.unwrap().value(), 42);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Multi-Tier Cache
//!
//! ```
//! use estrato::{Cache, EntryOptions};
//! use estrato_tier::testing::MockTier;
//! use std::time::Duration;
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let clock = Clock::new_frozen();
//! let cache = Cache::builder::<String, String>(clock)
//!     .name("images")
//!     .memory(10_000)
//!     .tier("remote", MockTier::new())
//!     .default_ttl(Duration::from_secs(300))
//!     .build()?;
//!
//! let entry = cache
//!     .get_or_insert_with(
//!         &"img:123".to_string(),
//!         EntryOptions::new().tags(["search:mountain"]),
//!         || async { "https://example.net/mountain.jpg".to_string() },
//!     )
//!     .await?;
//! assert!(entry.value().contains("mountain"));
//!
//! cache.invalidate_tag("search:mountain").await?;
//! assert!(cache.get(&"img:123".to_string()).await?.is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod builder;
pub mod cache;
pub mod config;
mod error;
mod health;
mod stack;
mod stats;
mod tags;
mod telemetry;

#[cfg(feature = "tokio")]
mod runtime;

#[doc(inline)]
pub use builder::CacheBuilder;
#[doc(inline)]
pub use cache::{Cache, EntryOptions};
#[doc(inline)]
pub use config::{CacheConfig, ConfigError, HealthPolicy};
#[doc(inline)]
pub use error::AllTiersUnavailable;
#[cfg(feature = "memory")]
#[doc(inline)]
pub use estrato_memory::{MemoryTier, MemoryTierBuilder};
#[cfg(feature = "redis")]
#[doc(inline)]
pub use estrato_redis::{RedisTier, RedisTierBuilder};
#[doc(inline)]
pub use estrato_tier::codec::SerializationError;
#[doc(inline)]
pub use estrato_tier::{CacheEntry, CacheTier, DynamicTier, DynamicTierExt, Error, Result, TierCapabilities};
#[doc(inline)]
pub use health::Health;
#[doc(inline)]
pub use stats::{CacheStats, TierStats};
#[cfg(any(feature = "logs", feature = "metrics", test))]
#[doc(inline)]
pub use telemetry::CacheTelemetry;

#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use estrato_tier::testing::{MockTier, TierOp};
