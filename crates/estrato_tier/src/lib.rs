// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core tier abstractions for building cache backends.
//!
//! This crate defines the [`CacheTier`] trait that all cache stores must satisfy,
//! along with [`CacheEntry`] for storing values with metadata, [`TierCapabilities`]
//! for advertising what a store handles natively, and [`Error`] types for fallible
//! operations.
//!
//! # Overview
//!
//! The tier abstraction separates storage concerns from caching features. Implement
//! [`CacheTier`] for your storage backend, then use `estrato` to compose tiers into
//! an ordered hierarchy with health tracking, promotion, stampede suppression, and
//! tag invalidation on top.
//!
//! # Implementing a Cache Tier
//!
//! ```
//! use estrato_tier::{CacheEntry, CacheTier, Error, TierCapabilities};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct SimpleTier<K, V>(RwLock<HashMap<K, CacheEntry<V>>>);
//!
//! impl<K, V> CacheTier<K, V> for SimpleTier<K, V>
//! where
//!     K: Clone + Eq + std::hash::Hash + Send + Sync,
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
//!         let data = self.0.read().unwrap();
//!         Ok(keys.iter().map(|k| data.get(k).cloned()).collect())
//!     }
//!
//!     async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.clone(), entry);
//!         Ok(())
//!     }
//!
//!     async fn insert_many(&self, entries: &[(K, CacheEntry<V>)]) -> Result<(), Error> {
//!         let mut data = self.0.write().unwrap();
//!         for (key, entry) in entries {
//!             data.insert(key.clone(), entry.clone());
//!         }
//!         Ok(())
//!     }
//!
//!     async fn invalidate(&self, key: &K) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//!
//!     async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
//!         let mut data = self.0.write().unwrap();
//!         let keys: Vec<K> = data
//!             .iter()
//!             .filter(|(_, e)| e.tags().iter().any(|t| t == tag))
//!             .map(|(k, _)| k.clone())
//!             .collect();
//!         for key in &keys {
//!             data.remove(key);
//!         }
//!         Ok(keys.len() as u64)
//!     }
//!
//!     async fn clear(&self) -> Result<(), Error> {
//!         self.0.write().unwrap().clear();
//!         Ok(())
//!     }
//!
//!     async fn probe(&self) -> Result<(), Error> {
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! The `dynamic-tier` feature (on by default) provides [`DynamicTier`], which wraps
//! any `CacheTier` in a type-erased container. The orchestrator in `estrato` uses
//! this to hold an ordered list of heterogeneous stores.

pub mod entry;
pub mod error;
#[cfg(any(feature = "serialize", test))]
pub mod codec;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub(crate) mod tier;

#[cfg(any(test, feature = "dynamic-tier"))]
mod dynamic;

#[cfg(any(test, feature = "dynamic-tier"))]
#[doc(inline)]
pub use dynamic::{DynamicTier, DynamicTierExt};
#[doc(inline)]
pub use entry::CacheEntry;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use tier::{CacheTier, TierCapabilities};
