//! # Cache Runtime
//!
//! Process-wide lifecycle for the subsystem. The store and bus connections
//! are constructed exactly once at startup, handed to every component by
//! reference, and torn down on shutdown — there is no implicit global state.
//!
//! ```no_run
//! # async fn example() -> chain_cache::CacheResult<()> {
//! use chain_cache::{CacheConfig, CacheRuntime};
//!
//! let runtime = CacheRuntime::start(CacheConfig::default()).await?;
//! let cache = runtime.service();
//! // ... hand `cache` to domain services, run the process ...
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::config::CacheConfig;
use crate::core::error::CacheResult;
use crate::invalidation::{InvalidationSubscriber, InvalidationTransport, RedisTransport};
use crate::service::CacheService;
use crate::stores::{LocalStore, RedisRemoteStore, RemoteStore};

/// Owns the cache service and its background tasks for one replica.
pub struct CacheRuntime {
    service: Arc<CacheService>,
    shutdown: CancellationToken,
    subscriber: JoinHandle<()>,
}

impl CacheRuntime {
    /// Connect to the configured Redis store and bus, then start the
    /// subsystem.
    pub async fn start(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let remote = Arc::new(RedisRemoteStore::connect(config.remote.clone()).await?);
        let transport = Arc::new(RedisTransport::connect(config.invalidation.clone()).await?);
        Self::start_with(config, remote, transport).await
    }

    /// Start the subsystem with injected store and transport
    /// implementations. Used by tests and single-node deployments.
    pub async fn start_with(
        config: CacheConfig,
        remote: Arc<dyn RemoteStore>,
        transport: Arc<dyn InvalidationTransport>,
    ) -> CacheResult<Self> {
        let local = Arc::new(LocalStore::new(config.local.clone()));
        let service = Arc::new(CacheService::new(
            Arc::clone(&local),
            remote,
            Arc::clone(&transport),
        ));

        let shutdown = CancellationToken::new();
        let subscriber = InvalidationSubscriber::new(
            local,
            transport,
            config.invalidation.reconnect_backoff,
            shutdown.child_token(),
        )
        .spawn();

        info!("cache runtime started");
        Ok(Self {
            service,
            shutdown,
            subscriber,
        })
    }

    /// The cache service shared with domain code.
    pub fn service(&self) -> Arc<CacheService> {
        Arc::clone(&self.service)
    }

    /// Stop the subscriber and release the runtime.
    pub async fn shutdown(self) -> CacheResult<()> {
        self.shutdown.cancel();
        let _ = self.subscriber.await;
        info!("cache runtime stopped");
        Ok(())
    }
}
