//! # Invalidation Transports
//!
//! The bus is abstracted behind [`InvalidationTransport`] with two
//! implementations: Redis pub/sub for real fleets, and an in-process
//! broadcast channel for tests and single-replica deployments. Both carry
//! the same JSON wire format.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use super::InvalidationMessage;
use crate::core::config::InvalidationConfig;
use crate::core::error::{CacheError, CacheResult};

/// Broadcast medium for invalidation messages.
///
/// `subscribe` yields a stream that ends when the underlying connection is
/// lost; the subscriber task re-subscribes with backoff. Undecodable
/// payloads are logged and skipped rather than terminating the stream.
#[async_trait]
pub trait InvalidationTransport: Send + Sync {
    /// Publish one message to every subscribed replica.
    async fn publish(&self, message: &InvalidationMessage) -> CacheResult<()>;

    /// Open a fresh subscription to the invalidation channel.
    async fn subscribe(&self) -> CacheResult<BoxStream<'static, InvalidationMessage>>;
}

/// Redis pub/sub transport.
pub struct RedisTransport {
    client: Client,
    publisher: ConnectionManager,
    channel: String,
}

impl RedisTransport {
    /// Connect the publishing side; subscriptions open their own dedicated
    /// connections (a Redis connection in subscribe mode cannot publish).
    pub async fn connect(config: InvalidationConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::transport(format!("invalid bus URL: {}", e)))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| CacheError::transport(format!("bus connection failed: {}", e)))?;

        info!(url = %config.url, channel = %config.channel, "invalidation bus connected");
        Ok(Self {
            client,
            publisher,
            channel: config.channel,
        })
    }
}

#[async_trait]
impl InvalidationTransport for RedisTransport {
    async fn publish(&self, message: &InvalidationMessage) -> CacheResult<()> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .await
            .map_err(|e| CacheError::transport(format!("publish failed: {}", e)))?;

        debug!(
            keys = message.keys.len(),
            receivers, "published invalidation message"
        );
        Ok(())
    }

    async fn subscribe(&self) -> CacheResult<BoxStream<'static, InvalidationMessage>> {
        let conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| CacheError::transport(format!("subscribe connection failed: {}", e)))?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| CacheError::transport(format!("subscribe failed: {}", e)))?;

        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "invalidation payload is not a string; skipping");
                        return None;
                    }
                };
                match serde_json::from_str::<InvalidationMessage>(&payload) {
                    Ok(message) => Some(message),
                    Err(e) => {
                        warn!(error = %e, "undecodable invalidation message; skipping");
                        None
                    }
                }
            })
            .boxed();
        Ok(stream)
    }
}

/// In-process broadcast transport.
///
/// Clones share the same channel, so several cache services inside one
/// process (or one test) see each other's invalidations exactly as separate
/// replicas would over Redis.
#[derive(Debug, Clone)]
pub struct BroadcastTransport {
    sender: broadcast::Sender<InvalidationMessage>,
}

impl BroadcastTransport {
    /// Create a transport buffering up to `capacity` undelivered messages
    /// per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl InvalidationTransport for BroadcastTransport {
    async fn publish(&self, message: &InvalidationMessage) -> CacheResult<()> {
        // A broadcast with no subscribers is not a failure of the medium.
        let _ = self.sender.send(message.clone());
        Ok(())
    }

    async fn subscribe(&self) -> CacheResult<BoxStream<'static, InvalidationMessage>> {
        let stream = BroadcastStream::new(self.sender.subscribe())
            .filter_map(|item| async move {
                match item {
                    Ok(message) => Some(message),
                    Err(BroadcastStreamRecvError::Lagged(missed)) => {
                        warn!(
                            missed,
                            "invalidation subscriber lagged; staleness degrades to TTL bound"
                        );
                        None
                    }
                }
            })
            .boxed();
        Ok(stream)
    }
}
