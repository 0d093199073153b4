// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Redis-backed cache tier.

use std::{fmt::Display, marker::PhantomData, sync::Arc, time::Duration};

use async_once_cell::OnceCell;
use estrato_tier::{CacheEntry, CacheTier, Error, TierCapabilities, codec};
use redis::aio::ConnectionManager;
use serde::{Serialize, de::DeserializeOwned};
use tick::{Clock, FutureExt as _};

use crate::builder::RedisTierBuilder;

struct Inner {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    namespace: String,
    op_timeout: Duration,
    retries: u32,
    initial_backoff: Duration,
    clock: Clock,
}

/// A cache tier backed by a Redis-compatible key-value service.
///
/// Keys are namespaced strings (`{ns}:k:{key}`), values are JSON-encoded
/// entries, and each invalidation tag is a Redis set of the keys carrying it
/// (`{ns}:t:{tag}`), so tag invalidation is a native bulk operation.
///
/// A payload that fails to decode on read - corrupt data or an incompatible
/// writer - is logged and treated as a miss; corrupt cache data must never
/// break the read path.
///
/// Cloning is cheap and clones share the same connection.
pub struct RedisTier<K, V> {
    inner: Arc<Inner>,
    _phantom: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for RedisTier<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _phantom: PhantomData,
        }
    }
}

impl<K, V> std::fmt::Debug for RedisTier<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTier")
            .field("namespace", &self.inner.namespace)
            .field("op_timeout", &self.inner.op_timeout)
            .field("retries", &self.inner.retries)
            .finish_non_exhaustive()
    }
}

impl<K, V> RedisTier<K, V> {
    /// Creates a new builder for the given connection URL.
    #[must_use]
    pub fn builder(url: impl Into<String>) -> RedisTierBuilder<K, V> {
        RedisTierBuilder::new(url)
    }

    pub(crate) fn from_builder(builder: &RedisTierBuilder<K, V>, client: redis::Client, clock: Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                conn: OnceCell::new(),
                namespace: builder.namespace.clone(),
                op_timeout: builder.op_timeout,
                retries: builder.retries,
                initial_backoff: builder.initial_backoff,
                clock,
            }),
            _phantom: PhantomData,
        }
    }

    /// The key under which a cache entry is stored.
    pub(crate) fn data_key(&self, key: &K) -> String
    where
        K: Display,
    {
        format!("{}:k:{key}", self.inner.namespace)
    }

    /// The key of the set holding the members of a tag.
    pub(crate) fn tag_key(&self, tag: &str) -> String {
        format!("{}:t:{tag}", self.inner.namespace)
    }

    /// The delay before retry number `retry` (1-based): doubles each time.
    pub(crate) fn backoff(&self, retry: u32) -> Duration {
        self.inner.initial_backoff.saturating_mul(1 << (retry - 1).min(16))
    }

    async fn connection(&self) -> Result<ConnectionManager, Error> {
        let conn = self
            .inner
            .conn
            .get_or_try_init(async { self.inner.client.get_connection_manager().await.map_err(Error::from_message) })
            .await?;
        Ok(conn.clone())
    }

    /// Runs one command under the timeout/retry budget.
    ///
    /// Connection establishment counts against the same timeout, so a call
    /// issued while the service is down fails within bounded time.
    async fn query<T>(&self, cmd: &redis::Cmd) -> Result<T, Error>
    where
        T: redis::FromRedisValue + Send,
    {
        let mut last_err = None;
        for attempt in 1..=self.inner.retries {
            if attempt > 1 {
                self.inner.clock.delay(self.backoff(attempt - 1)).await;
            }

            let outcome = async {
                let mut conn = self.connection().await?;
                cmd.query_async(&mut conn).await.map_err(Error::from_message)
            }
            .timeout(&self.inner.clock, self.inner.op_timeout)
            .await;

            match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => last_err = Some(err),
                Err(timed_out) => last_err = Some(Error::from_message(timed_out)),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::from_message("retry budget exhausted")))
    }

    /// Runs a pipeline under the same timeout/retry budget as [`query`](Self::query).
    async fn exec(&self, pipe: &redis::Pipeline) -> Result<(), Error> {
        let mut last_err = None;
        for attempt in 1..=self.inner.retries {
            if attempt > 1 {
                self.inner.clock.delay(self.backoff(attempt - 1)).await;
            }

            let outcome = async {
                let mut conn = self.connection().await?;
                let result: Result<(), redis::RedisError> = pipe.query_async(&mut conn).await;
                result.map_err(Error::from_message)
            }
            .timeout(&self.inner.clock, self.inner.op_timeout)
            .await;

            match outcome {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => last_err = Some(err),
                Err(timed_out) => last_err = Some(Error::from_message(timed_out)),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::from_message("retry budget exhausted")))
    }
}

impl<K, V> RedisTier<K, V>
where
    K: Display,
    V: Serialize,
{
    /// Queues the SET (plus tag-set updates) for one entry onto a pipeline.
    fn push_insert(&self, pipe: &mut redis::Pipeline, key: &K, entry: &CacheEntry<V>) -> Result<(), Error> {
        // Encoding failures are a caller bug and must surface loudly; they
        // are deliberately not routed through the retry budget.
        let payload = codec::encode(entry).map_err(Error::from_message)?;
        let data_key = self.data_key(key);

        let set = pipe.cmd("SET").arg(&data_key).arg(payload);
        if let Some(ttl) = entry.ttl() {
            // PX must be at least 1; a zero TTL still expires immediately.
            set.arg("PX").arg((ttl.as_millis() as u64).max(1));
        }
        set.ignore();

        for tag in entry.tags() {
            pipe.cmd("SADD").arg(self.tag_key(tag)).arg(&data_key).ignore();
        }
        Ok(())
    }
}

impl<K, V> RedisTier<K, V>
where
    K: Display + Send + Sync,
    V: DeserializeOwned,
{
    /// Decodes a stored payload, downgrading corrupt data to a miss.
    fn decode_payload(&self, payload: &str) -> Option<CacheEntry<V>> {
        match codec::decode(payload) {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(namespace = %self.inner.namespace, error = %err, "discarding cache payload that failed to decode");
                None
            }
        }
    }
}

impl<K, V> CacheTier<K, V> for RedisTier<K, V>
where
    K: Display + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        let payload: Option<String> = self.query(redis::cmd("GET").arg(self.data_key(key))).await?;
        Ok(payload.and_then(|p| self.decode_payload(&p)))
    }

    async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<CacheEntry<V>>>, Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let data_keys: Vec<String> = keys.iter().map(|k| self.data_key(k)).collect();
        let payloads: Vec<Option<String>> = self.query(redis::cmd("MGET").arg(data_keys)).await?;
        Ok(payloads
            .into_iter()
            .map(|payload| payload.and_then(|p| self.decode_payload(&p)))
            .collect())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        let mut pipe = redis::pipe();
        self.push_insert(&mut pipe, key, &entry)?;
        self.exec(&pipe).await
    }

    async fn insert_many(&self, entries: &[(K, CacheEntry<V>)]) -> Result<(), Error> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for (key, entry) in entries {
            self.push_insert(&mut pipe, key, entry)?;
        }
        self.exec(&pipe).await
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        let _removed: u64 = self.query(redis::cmd("DEL").arg(self.data_key(key))).await?;
        Ok(())
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, Error> {
        let tag_key = self.tag_key(tag);
        let members: Vec<String> = self.query(redis::cmd("SMEMBERS").arg(&tag_key)).await?;

        let mut removed = 0;
        if !members.is_empty() {
            removed = self.query(redis::cmd("DEL").arg(members)).await?;
        }
        let _dropped: u64 = self.query(redis::cmd("DEL").arg(&tag_key)).await?;
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), Error> {
        // Only this namespace's keys are removed; the service may be shared.
        let pattern = format!("{}:*", self.inner.namespace);
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = self
                .query(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(100),
                )
                .await?;
            if !keys.is_empty() {
                let _removed: u64 = self.query(redis::cmd("DEL").arg(keys)).await?;
            }
            cursor = next;
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    async fn probe(&self) -> Result<(), Error> {
        let _pong: String = self.query(&redis::cmd("PING")).await?;
        Ok(())
    }

    fn capabilities(&self) -> TierCapabilities {
        TierCapabilities::all()
    }
}
