//! # Cache Service
//!
//! Orchestrates get-or-set across the local store, the remote store, and the
//! value-producing factory, and owns the TTL policy application. The read
//! path is: local tier, then remote tier, then — only on a full miss — the
//! factory, under single-flight protection so concurrent callers share one
//! upstream computation.
//!
//! ## Error policy
//! Callers only ever see factory failures ([`crate::CacheError::Upstream`]).
//! Every other failure degrades in favor of availability:
//! - remote read failure: treated as a miss, the factory runs;
//! - remote write failure: logged and counted, the computed value is still
//!   returned (this replica serves the value other replicas will recompute);
//! - value not serializable: both tier writes are skipped, the immediate
//!   caller still gets the value, and the divergence is counted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use metrics::counter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::core::error::{CacheError, CacheResult};
use crate::invalidation::{InvalidationMessage, InvalidationTransport};
use crate::key::CacheKey;
use crate::singleflight::FlightGroup;
use crate::stores::{LocalStore, LocalStoreStats, RemoteStore};

/// TTL policy for one cache entry: the shared remote copy and the
/// process-local copy age independently.
///
/// Keeping `local <= remote` is a convention, not an enforced rule: the
/// local tier should never be configured to outlive the shared copy, and
/// [`TtlPair::new`] warns when a call site breaks that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPair {
    /// TTL written to the remote store.
    pub remote: Duration,

    /// TTL for this process's local copy.
    pub local: Duration,
}

impl TtlPair {
    /// Create a pair, warning when the local TTL exceeds the remote one.
    pub fn new(remote: Duration, local: Duration) -> Self {
        if local > remote {
            warn!(
                remote_secs = remote.as_secs(),
                local_secs = local.as_secs(),
                "local TTL exceeds remote TTL; local tier will outlive the shared copy"
            );
        }
        Self { remote, local }
    }

    /// Fast-changing values such as pool reserves and prices: 60s / 30s.
    pub const fn fast() -> Self {
        Self {
            remote: Duration::from_secs(60),
            local: Duration::from_secs(30),
        }
    }

    /// Semi-static contract metadata: 1h / 1h.
    pub const fn metadata() -> Self {
        Self {
            remote: Duration::from_secs(3600),
            local: Duration::from_secs(3600),
        }
    }

    /// Admin-controlled flags that should propagate near-instantly without
    /// an invalidation round-trip: 1s / 1s.
    pub const fn near_realtime() -> Self {
        Self {
            remote: Duration::from_secs(1),
            local: Duration::from_secs(1),
        }
    }
}

/// Aggregate statistics for one cache service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Local tier counters.
    pub local: LocalStoreStats,

    /// Local hit ratio over all local lookups.
    pub hit_ratio: f64,

    /// Computations currently in flight.
    pub in_flight: usize,

    /// When this service was constructed.
    pub started_at: DateTime<Utc>,
}

/// The cache API injected into domain services.
///
/// Domain code holds a client as a field (composition, not inheritance) and
/// builds its own keys as pure functions; this trait is the only seam it
/// needs. Implemented by [`CacheService`]; the generic methods make it a
/// bound for generic composition rather than a trait object.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Read-through lookup. See [`CacheService::get_or_set`].
    async fn get_or_set<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: TtlPair,
        factory: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static;

    /// Out-of-band write. See [`CacheService::set_and_invalidate`].
    async fn set_and_invalidate<T>(
        &self,
        key: &CacheKey,
        value: &T,
        remote_ttl: Duration,
    ) -> CacheResult<()>
    where
        T: Serialize + Sync;
}

/// Two-tier read-through cache with single-flight deduplication.
pub struct CacheService {
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    transport: Arc<dyn InvalidationTransport>,
    flights: FlightGroup,
    started_at: DateTime<Utc>,
}

impl CacheService {
    /// Assemble a service from its tiers and the invalidation bus.
    pub fn new(
        local: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        transport: Arc<dyn InvalidationTransport>,
    ) -> Self {
        Self {
            local,
            remote,
            transport,
            flights: FlightGroup::new(),
            started_at: Utc::now(),
        }
    }

    /// Read-through lookup.
    ///
    /// Consults the local store, then the remote store, and only on a full
    /// miss invokes `factory` — under single-flight protection, so N
    /// concurrent callers for one key trigger one factory call and share its
    /// outcome. A successful computation is written to the remote store with
    /// `ttl.remote` and to the local store with `ttl.local`.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: TtlPair,
        factory: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        validate_key(key)?;
        if let Some(bytes) = self.local.get(key.as_str()) {
            match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!(key = %key, "local tier hit");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "undecodable local entry; treating as miss");
                    self.local.delete(key.as_str());
                }
            }
        }

        let local = Arc::clone(&self.local);
        let remote = Arc::clone(&self.remote);
        let key_owned = key.clone();
        self.flights
            .run(key.as_str(), move || {
                fill_through(local, remote, key_owned, ttl, factory).boxed()
            })
            .await
    }

    /// Write a value computed out of band and announce its key.
    ///
    /// Writes the remote store directly, then publishes a single-key
    /// invalidation message. This process's local store is deliberately not
    /// touched: the writer's own subscriber purges it, so the writer
    /// observes the exact invalidation path every other replica does.
    pub async fn set_and_invalidate<T>(
        &self,
        key: &CacheKey,
        value: &T,
        remote_ttl: Duration,
    ) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        validate_key(key)?;
        let bytes = serde_json::to_vec(value)?;
        self.remote.set(key.as_str(), &bytes, remote_ttl).await?;
        self.publish_invalidation(std::slice::from_ref(key)).await;
        Ok(())
    }

    /// Start a batch of out-of-band writes that invalidate together.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            service: self,
            keys: Vec::new(),
        }
    }

    /// Whether the shared tier is reachable.
    pub async fn health(&self) -> bool {
        self.remote.ping().await.unwrap_or(false)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        let local = self.local.stats();
        let lookups = local.hits + local.misses;
        let hit_ratio = if lookups > 0 {
            local.hits as f64 / lookups as f64
        } else {
            0.0
        };
        CacheStats {
            local,
            hit_ratio,
            in_flight: self.flights.in_flight(),
            started_at: self.started_at,
        }
    }

    /// Publish an invalidation for the given keys, degrading to TTL-only
    /// convergence when the bus is down.
    async fn publish_invalidation(&self, keys: &[CacheKey]) {
        let message = InvalidationMessage::new(keys.iter().map(|k| k.as_str().to_string()));
        if let Err(err) = self.transport.publish(&message).await {
            // The write itself succeeded; replicas now converge on their
            // remote TTLs instead of the bus.
            error!(
                error = %err,
                keys = message.keys.len(),
                "failed to publish invalidation; staleness degrades to TTL bound"
            );
            counter!("cache_publish_errors").increment(1);
        }
    }
}

#[async_trait]
impl CacheClient for CacheService {
    async fn get_or_set<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: TtlPair,
        factory: F,
    ) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        CacheService::get_or_set(self, key, ttl, factory).await
    }

    async fn set_and_invalidate<T>(
        &self,
        key: &CacheKey,
        value: &T,
        remote_ttl: Duration,
    ) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        CacheService::set_and_invalidate(self, key, value, remote_ttl).await
    }
}

/// Accumulates out-of-band writes so several keys invalidated by one logical
/// update go out as a single bus message.
pub struct WriteBatch<'a> {
    service: &'a CacheService,
    keys: Vec<CacheKey>,
}

impl WriteBatch<'_> {
    /// Write one value to the remote store and queue its key for the batch
    /// invalidation.
    pub async fn set<T>(
        &mut self,
        key: &CacheKey,
        value: &T,
        remote_ttl: Duration,
    ) -> CacheResult<()>
    where
        T: Serialize + Sync,
    {
        validate_key(key)?;
        let bytes = serde_json::to_vec(value)?;
        self.service.remote.set(key.as_str(), &bytes, remote_ttl).await?;
        self.keys.push(key.clone());
        Ok(())
    }

    /// Publish one invalidation message covering every key written so far.
    pub async fn commit(self) -> CacheResult<()> {
        if !self.keys.is_empty() {
            self.service.publish_invalidation(&self.keys).await;
        }
        Ok(())
    }
}

fn validate_key(key: &CacheKey) -> CacheResult<()> {
    if key.as_str().is_empty() {
        return Err(CacheError::key("cache key is empty"));
    }
    Ok(())
}

/// The miss path run under single-flight protection: remote tier first,
/// factory only on a full miss.
async fn fill_through<T, F, Fut>(
    local: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    key: CacheKey,
    ttl: TtlPair,
    factory: F,
) -> CacheResult<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    match remote.get(key.as_str()).await {
        Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                // Cross-process sharing path: another replica already paid
                // for the computation.
                local.set(key.as_str(), bytes, ttl.local);
                return Ok(value);
            }
            Err(err) => {
                warn!(key = %key, error = %err, "undecodable remote entry; recomputing");
                counter!("cache_serialization_errors").increment(1);
            }
        },
        Ok(None) => {}
        Err(err) => {
            warn!(key = %key, error = %err, "remote read failed; falling through to factory");
            counter!("cache_remote_read_degraded").increment(1);
        }
    }

    counter!("cache_factory_calls").increment(1);
    let value = factory()
        .await
        .map_err(|err| CacheError::upstream(format!("{:#}", err)))?;

    match serde_json::to_vec(&value) {
        Ok(bytes) => {
            if let Err(err) = remote.set(key.as_str(), &bytes, ttl.remote).await {
                warn!(key = %key, error = %err, "remote write failed; serving computed value");
                counter!("cache_remote_write_errors").increment(1);
            }
            local.set(key.as_str(), bytes, ttl.local);
        }
        Err(err) => {
            error!(key = %key, error = %err, "value not serializable; skipping both cache tiers");
            counter!("cache_serialization_errors").increment(1);
        }
    }

    Ok(value)
}
