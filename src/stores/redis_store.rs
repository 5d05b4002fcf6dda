//! # Redis Remote Store
//!
//! [`RemoteStore`] implementation over a Redis instance shared by every
//! replica. Uses a multiplexed connection manager, prefixes every key, and
//! retries failed operations with a linear backoff before reporting a
//! transient error.

use async_trait::async_trait;
use metrics::counter;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::RemoteStore;
use crate::core::config::RemoteStoreConfig;
use crate::core::error::{CacheError, CacheResult};

/// Redis-backed shared store.
pub struct RedisRemoteStore {
    config: RemoteStoreConfig,
    manager: ConnectionManager,
}

impl RedisRemoteStore {
    /// Connect to the configured Redis instance.
    pub async fn connect(config: RemoteStoreConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let manager = tokio::time::timeout(
            config.connection_timeout,
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            CacheError::remote(format!("connection to {} timed out", config.url))
        })??;

        info!(url = %config.url, "remote store connected");
        Ok(Self { config, manager })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Run one operation against the store, retrying transient failures.
    ///
    /// The connection manager is a cheap clonable handle that reconnects on
    /// its own; retries only add the bounded backoff on top.
    async fn with_retry<T, F, Fut>(&self, op: &str, mut run: F) -> CacheResult<T>
    where
        F: FnMut(ConnectionManager) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match run(self.manager.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    counter!("cache_remote_errors").increment(1);
                    if attempt > self.config.max_retries {
                        return Err(CacheError::remote(format!(
                            "{} failed after {} attempts: {}",
                            op, attempt, err
                        )));
                    }
                    warn!(error = %err, op, attempt, "remote store operation failed, retrying");
                    sleep(self.config.retry_delay * attempt).await;
                }
            }
        }
    }
}

#[async_trait]
impl RemoteStore for RedisRemoteStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let full_key = self.full_key(key);
        let value = self
            .with_retry("GET", |mut conn| {
                let key = full_key.clone();
                async move { conn.get::<_, Option<Vec<u8>>>(&key).await }
            })
            .await?;

        match &value {
            Some(_) => {
                counter!("cache_remote_hits").increment(1);
                debug!(key, "remote store hit");
            }
            None => {
                counter!("cache_remote_misses").increment(1);
                debug!(key, "remote store miss");
            }
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let full_key = self.full_key(key);
        // Redis TTLs are whole seconds; never round a short TTL down to
        // "no expiry".
        let ttl_seconds = ttl.as_secs().max(1);
        let payload = value.to_vec();

        self.with_retry("SETEX", |mut conn| {
            let key = full_key.clone();
            let payload = payload.clone();
            async move { conn.set_ex::<_, _, ()>(&key, &payload, ttl_seconds).await }
        })
        .await?;

        debug!(key, ttl_seconds, "remote store set");
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();

        let removed = self
            .with_retry("DEL", |mut conn| {
                let keys = full_keys.clone();
                async move { conn.del::<_, u64>(&keys).await }
            })
            .await?;

        debug!(requested = keys.len(), removed, "remote store delete");
        Ok(removed)
    }

    async fn ping(&self) -> CacheResult<bool> {
        let response = self
            .with_retry("PING", |mut conn| async move {
                redis::cmd("PING").query_async::<_, String>(&mut conn).await
            })
            .await;

        match response {
            Ok(pong) => Ok(pong == "PONG"),
            Err(_) => Ok(false),
        }
    }
}
