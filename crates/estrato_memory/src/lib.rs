// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Bounded in-process cache tier with strict LRU eviction.
//!
//! This crate provides [`MemoryTier`], the always-available first tier of an
//! estrato cache hierarchy. It keeps entries in process memory behind a single
//! mutex, evicts the least-recently-used entry once the configured capacity is
//! reached, expires entries lazily on read, and maintains a `tag -> keys`
//! index so tag invalidation touches only the entries carrying the tag.
//!
//! # Quick Start
//!
//! ```
//! use estrato_memory::MemoryTierBuilder;
//! use estrato_tier::{CacheEntry, CacheTier};
//! use std::time::Duration;
//! use tick::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new_frozen();
//! let tier = MemoryTierBuilder::<String, i32>::new()
//!     .max_entries(1000)
//!     .time_to_live(Duration::from_secs(300))
//!     .build(clock);
//!
//! tier.insert(&"key".to_string(), CacheEntry::new(42)).await?;
//! let value = tier.get(&"key".to_string()).await?;
//! assert_eq!(*value.unwrap().value(), 42);
//! # Ok::<(), estrato_tier::Error>(())
//! # });
//! ```
//!
//! # Eviction order
//!
//! Recency is tracked with a strictly monotonic access sequence, so eviction
//! order is exact: the entry with the oldest access goes first, and entries
//! that were never touched after insertion fall out in insertion order.

pub mod builder;
pub mod tier;

#[doc(inline)]
pub use builder::MemoryTierBuilder;
#[doc(inline)]
pub use tier::MemoryTier;
