//! # Invalidation Subscriber
//!
//! A dedicated task per replica that blocks on the invalidation stream and
//! purges named keys from the local store. It never touches the remote
//! store — that tier is already authoritative when a message arrives.
//!
//! The task survives transport loss: it re-subscribes with a fixed backoff
//! and counts every disconnect, because while the subscription is down the
//! replica's staleness is bounded only by its local TTLs instead of by
//! invalidation delivery.

use futures::StreamExt;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{InvalidationMessage, InvalidationTransport};
use crate::stores::LocalStore;

/// Per-replica listener that keeps the local store coherent.
pub struct InvalidationSubscriber {
    local: Arc<LocalStore>,
    transport: Arc<dyn InvalidationTransport>,
    reconnect_backoff: Duration,
    shutdown: CancellationToken,
}

impl InvalidationSubscriber {
    /// Create a subscriber; call [`spawn`](Self::spawn) to start it.
    pub fn new(
        local: Arc<LocalStore>,
        transport: Arc<dyn InvalidationTransport>,
        reconnect_backoff: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            local,
            transport,
            reconnect_backoff,
            shutdown,
        }
    }

    /// Start the subscriber task. It runs until the shutdown token fires.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!("invalidation subscriber started");
        loop {
            let mut stream = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                subscribed = self.transport.subscribe() => match subscribed {
                    Ok(stream) => stream,
                    Err(err) => {
                        error!(
                            error = %err,
                            "invalidation subscribe failed; staleness degrades to local TTL bound"
                        );
                        counter!("cache_invalidation_transport_errors").increment(1);
                        if self.backoff().await {
                            continue;
                        }
                        break;
                    }
                },
            };

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("invalidation subscriber stopped");
                        return;
                    }
                    message = stream.next() => match message {
                        Some(message) => self.handle(message),
                        None => {
                            warn!("invalidation stream closed; resubscribing");
                            counter!("cache_invalidation_transport_errors").increment(1);
                            break;
                        }
                    }
                }
            }

            if !self.backoff().await {
                break;
            }
        }
        info!("invalidation subscriber stopped");
    }

    fn handle(&self, message: InvalidationMessage) {
        let purged = self.local.purge_keys(&message.keys);
        counter!("cache_invalidations_received").increment(1);
        debug!(
            keys = message.keys.len(),
            purged, "processed invalidation message"
        );
    }

    /// Sleep before reconnecting; returns `false` when shutdown fired first.
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = sleep(self.reconnect_backoff) => true,
        }
    }
}
