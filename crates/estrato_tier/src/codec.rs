// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! JSON wire representation for entries stored in remote tiers.
//!
//! Remote stores hold opaque strings; this module converts a [`CacheEntry`]
//! to and from its JSON form, preserving the write timestamp, the TTL, and
//! the invalidation tags so that expiry stays anchored to the original write
//! no matter which tier an entry is read back from.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::CacheEntry;

/// A value could not be encoded or decoded.
///
/// On the write path this is a caller bug (the value type cannot be
/// represented as JSON) and is surfaced loudly. On the read path a decode
/// failure means the stored payload is corrupt or from an incompatible
/// version; readers treat that as a cache miss rather than an error.
#[ohno::error]
#[no_constructors]
#[display("cache value could not be serialized or deserialized")]
pub struct SerializationError {}

impl SerializationError {
    /// Creates a new serialization error with the default message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ohno_core: ohno::OhnoCore::default(),
        }
    }

    /// Creates a serialization error from an underlying cause.
    pub fn caused_by(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            ohno_core: ohno::OhnoCore::from(cause),
        }
    }
}

impl Default for SerializationError {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire form of a [`CacheEntry`]. Field names are kept short because remote
/// stores hold millions of these.
#[derive(Debug, Deserialize)]
struct WireEntry<V> {
    v: V,
    #[serde(default)]
    at: Option<u64>,
    #[serde(default)]
    ttl: Option<u64>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Borrowed counterpart of [`WireEntry`], used on the write path.
#[derive(Debug, Serialize)]
struct WireEntryRef<'a, V> {
    v: &'a V,
    #[serde(skip_serializing_if = "Option::is_none")]
    at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u64>,
    #[serde(skip_serializing_if = "slice_is_empty")]
    tags: &'a [String],
}

fn slice_is_empty(tags: &[String]) -> bool {
    tags.is_empty()
}

/// Encodes an entry into its JSON wire form.
///
/// # Errors
///
/// Returns [`SerializationError`] if the value cannot be represented as JSON.
pub fn encode<V: Serialize>(entry: &CacheEntry<V>) -> Result<String, SerializationError> {
    let wire = WireEntryRef {
        v: entry.value(),
        at: entry.cached_at().and_then(unix_millis),
        ttl: entry.ttl().map(|ttl| ttl.as_millis().try_into().unwrap_or(u64::MAX)),
        tags: entry.tags(),
    };
    serde_json::to_string(&wire).map_err(SerializationError::caused_by)
}

/// Decodes an entry from its JSON wire form.
///
/// # Errors
///
/// Returns [`SerializationError`] if the payload is not valid JSON for the
/// expected value type.
pub fn decode<V: DeserializeOwned>(payload: &str) -> Result<CacheEntry<V>, SerializationError> {
    let wire: WireEntry<V> = serde_json::from_str(payload).map_err(SerializationError::caused_by)?;

    let mut entry = CacheEntry::new(wire.v);
    if let Some(at) = wire.at {
        entry.set_cached_at(UNIX_EPOCH + Duration::from_millis(at));
    }
    if let Some(ttl) = wire.ttl {
        entry.set_ttl(Duration::from_millis(ttl));
    }
    if !wire.tags.is_empty() {
        entry.set_tags(wire.tags);
    }
    Ok(entry)
}

/// Milliseconds since the unix epoch; a pre-epoch timestamp has no wire form.
fn unix_millis(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| d.as_millis().try_into().ok())
}
