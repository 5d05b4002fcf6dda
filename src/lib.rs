//! # chain-cache
//!
//! A two-tier read-through cache with single-flight deduplication and
//! distributed invalidation, built for data-serving backends whose values
//! come from expensive, rate-limited upstreams (chain RPC queries, aggregate
//! analytics).
//!
//! ## Architecture
//! 1. **Local store**: per-process in-memory TTL map — the fast path.
//! 2. **Remote store**: shared Redis tier — the source of truth across the
//!    fleet, so one replica's computation serves every replica.
//! 3. **Single-flight coordinator**: concurrent misses for one key share a
//!    single upstream computation.
//! 4. **Cache service**: get-or-set orchestration and TTL policy.
//! 5. **Invalidation bus + subscriber**: pub/sub protocol purging replica
//!    local stores when fresher values are written out of band.
//!
//! The protocol is eventually consistent: staleness is bounded by the local
//! TTL plus invalidation delivery latency, and degrades to the TTL bound
//! alone when the bus is down.
//!
//! ## Usage
//! ```no_run
//! # async fn example() -> chain_cache::CacheResult<()> {
//! use chain_cache::{CacheConfig, CacheRuntime, KeyBuilder, TtlPair};
//!
//! let runtime = CacheRuntime::start(CacheConfig::default()).await?;
//! let cache = runtime.service();
//!
//! let key = KeyBuilder::new("pair")
//!     .push("0xabc123")
//!     .push("firstTokenPrice")
//!     .build();
//! let price: f64 = cache
//!     .get_or_set(&key, TtlPair::fast(), || async {
//!         // expensive upstream computation
//!         Ok(1.25)
//!     })
//!     .await?;
//! # let _ = price;
//! runtime.shutdown().await?;
//! # Ok(())
//! # }
//! ```

/// Error types and configuration structures.
pub mod core;

/// Deterministic cache key construction.
pub mod key;

/// Per-process coalescing of concurrent computations.
pub mod singleflight;

/// Local, remote, and in-process store implementations.
pub mod stores;

/// Get-or-set orchestration, TTL policy, and the writer path.
pub mod service;

/// Explicit call-site caching combinator.
pub mod cached;

/// Invalidation wire format, transports, and the subscriber task.
pub mod invalidation;

/// Process-wide startup and shutdown.
pub mod runtime;

/// Tracing initialization and the crate's metric catalogue.
pub mod observability;

pub use cached::Cached;
pub use core::config::{CacheConfig, InvalidationConfig, LocalStoreConfig, RemoteStoreConfig};
pub use core::error::{CacheError, CacheResult};
pub use invalidation::{
    BroadcastTransport, InvalidationMessage, InvalidationSubscriber, InvalidationTransport,
    RedisTransport,
};
pub use key::{build_key, CacheKey, KeyBuilder};
pub use runtime::CacheRuntime;
pub use service::{CacheClient, CacheService, CacheStats, TtlPair, WriteBatch};
pub use singleflight::FlightGroup;
pub use stores::{CacheEntry, LocalStore, LocalStoreStats, MemoryRemoteStore, RedisRemoteStore, RemoteStore};
