// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tag side index for tiers without native tag support.
//!
//! The orchestrator maintains this index synchronously on every write. When a
//! tag is invalidated, tiers with native tag support get one bulk call; for
//! the rest, the index supplies the keys to delete individually. Buckets are
//! dropped as soon as their key set empties, and the background prober sweeps
//! for stragglers, so the index does not grow past the set of live tagged
//! keys this process has written.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use parking_lot::Mutex;

struct TagIndexInner<K> {
    by_tag: HashMap<String, HashSet<K>>,
    by_key: HashMap<K, Vec<String>>,
}

pub(crate) struct TagIndex<K> {
    inner: Mutex<TagIndexInner<K>>,
}

impl<K> std::fmt::Debug for TagIndex<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagIndex").finish_non_exhaustive()
    }
}

impl<K> TagIndex<K>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(TagIndexInner {
                by_tag: HashMap::new(),
                by_key: HashMap::new(),
            }),
        }
    }

    /// Re-associates a key with a new tag set, dropping stale associations.
    pub(crate) fn update(&self, key: &K, tags: &[String]) {
        let mut inner = self.inner.lock();

        if let Some(old_tags) = inner.by_key.remove(key) {
            for tag in old_tags {
                if let Some(keys) = inner.by_tag.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        inner.by_tag.remove(&tag);
                    }
                }
            }
        }

        if tags.is_empty() {
            return;
        }
        for tag in tags {
            inner.by_tag.entry(tag.clone()).or_default().insert(key.clone());
        }
        inner.by_key.insert(key.clone(), tags.to_vec());
    }

    /// Removes a key from the index entirely (on delete or invalidation).
    pub(crate) fn remove_key(&self, key: &K) {
        self.update(key, &[]);
    }

    /// Removes a tag's bucket and returns the keys it held.
    pub(crate) fn take(&self, tag: &str) -> Vec<K> {
        let mut inner = self.inner.lock();
        let Some(keys) = inner.by_tag.remove(tag) else {
            return Vec::new();
        };

        for key in &keys {
            let empty = if let Some(tags) = inner.by_key.get_mut(key) {
                tags.retain(|t| t != tag);
                tags.is_empty()
            } else {
                false
            };
            if empty {
                inner.by_key.remove(key);
            }
        }
        keys.into_iter().collect()
    }

    /// Drops buckets whose key sets have emptied.
    pub(crate) fn sweep(&self) {
        let mut inner = self.inner.lock();
        inner.by_tag.retain(|_, keys| !keys.is_empty());
    }

    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.by_tag.clear();
        inner.by_key.clear();
    }
}
