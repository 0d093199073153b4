// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runtime abstraction for background tasks.
//!
//! The only background work the cache schedules is health probing. The
//! runtime is detected from the ambient context at build time, so a cache
//! constructed outside an async runtime (tests under a plain executor, CLI
//! tools) simply runs without background probes.

#![cfg(feature = "tokio")]

#[derive(Debug, Clone)]
pub(crate) struct Runtime {
    kind: RuntimeKind,
}

#[derive(Debug, Clone)]
enum RuntimeKind {
    Tokio(tokio::runtime::Handle),
}

impl Runtime {
    /// Captures the ambient runtime, if any.
    pub(crate) fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(|handle| Self {
            kind: RuntimeKind::Tokio(handle),
        })
    }

    pub(crate) fn spawn<T>(&self, work: T)
    where
        T: Future<Output = ()> + Send + 'static,
    {
        match &self.kind {
            RuntimeKind::Tokio(handle) => {
                drop(handle.spawn(work));
            }
        }
    }
}
