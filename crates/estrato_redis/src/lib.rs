// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Redis-backed cache tier for the estrato caching framework.
//!
//! This crate provides [`RedisTier`], a [`CacheTier`](estrato_tier::CacheTier)
//! over any Redis-compatible key-value service. Values travel as JSON, TTLs
//! map to native `PX` expiry, and invalidation tags map to per-tag Redis sets
//! so a whole tag can be dropped in one round trip.
//!
//! Every command is bounded by a configurable timeout and a fixed retry
//! budget with exponential backoff; once the budget is exhausted the failure
//! surfaces as one opaque tier error, which the orchestrator treats as "tier
//! unavailable for this call" rather than an application error.
//!
//! The connection is established lazily on first use. After that the
//! underlying connection manager reconnects on its own schedule in the
//! background, so a call issued while the link is down fails within its
//! timeout instead of blocking on a reconnect.
//!
//! # Quick Start
//!
//! ```no_run
//! use estrato_redis::RedisTier;
//! use estrato_tier::{CacheEntry, CacheTier};
//! use tick::Clock;
//!
//! # async fn example() -> Result<(), estrato_tier::Error> {
//! let clock = Clock::new_tokio();
//! let tier: RedisTier<String, String> = RedisTier::builder("redis://127.0.0.1/")
//!     .namespace("images")
//!     .build(clock)?;
//!
//! tier.insert(&"img:123".to_string(), CacheEntry::new("payload".to_string())).await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod tier;

#[doc(inline)]
pub use builder::RedisTierBuilder;
#[doc(inline)]
pub use tier::RedisTier;
