//! # Cache Stores Module
//!
//! Store implementations for the two cache tiers: the process-local TTL map
//! and the shared remote store, plus an in-process remote used by tests and
//! single-node deployments.

pub mod local;
pub mod memory;
pub mod redis_store;

pub use local::{LocalStore, LocalStoreStats};
pub use memory::MemoryRemoteStore;
pub use redis_store::RedisRemoteStore;

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::core::error::CacheResult;

/// A single cached value with its TTL metadata.
///
/// Entries only ever live in process memory (the remote store keeps its own
/// TTL bookkeeping), so expiry is tracked on the monotonic clock — wall
/// clock steps cannot resurrect or prematurely kill an entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` from now.
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Whether the entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }

    /// Time remaining before expiry, zero if already expired.
    pub fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.stored_at.elapsed())
    }

    /// The cached bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consume the entry, returning the cached bytes.
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }
}

/// The shared key/value store reachable by every replica.
///
/// This is the source of truth across the fleet. All failures are transient
/// ([`crate::CacheError::Remote`]); the cache service decides per call site
/// whether to degrade or propagate.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store a value with a TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Delete a batch of keys, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64>;

    /// Liveness probe.
    async fn ping(&self) -> CacheResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_not_expired() {
        let entry = CacheEntry::new(b"v".to_vec(), Duration::from_secs(60));
        assert!(!entry.is_expired());
        assert!(entry.remaining() > Duration::from_secs(59));
    }

    #[test]
    fn zero_ttl_entry_is_immediately_expired() {
        let entry = CacheEntry::new(b"v".to_vec(), Duration::ZERO);
        assert!(entry.is_expired());
        assert_eq!(entry.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let entry = CacheEntry::new(b"v".to_vec(), Duration::from_millis(50));
        assert!(!entry.is_expired());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(entry.is_expired());
    }
}
