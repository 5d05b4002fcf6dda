//! # Local Store
//!
//! Per-process, in-memory TTL map — the fast path of the cache. Entries
//! expire lazily on read and via a background sweep; there is no size bound
//! and no LRU, expiry is purely TTL-driven. Deployments with many distinct
//! keys must size TTLs accordingly, since nothing else limits growth.
//!
//! The store is owned exclusively by its process: the cache service writes
//! it on fills and the invalidation subscriber purges it on bus messages.
//! No other process ever reads or writes it.

use dashmap::DashMap;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::debug;

use super::CacheEntry;
use crate::core::config::LocalStoreConfig;

/// Snapshot of local store counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreStats {
    /// Number of live entries (including not-yet-swept expired ones).
    pub entries: usize,

    /// Reads answered from this store.
    pub hits: u64,

    /// Reads that fell through to the next tier.
    pub misses: u64,

    /// Entries removed by invalidation purges.
    pub purged: u64,

    /// Expired entries removed by the background sweep.
    pub expired_swept: u64,
}

/// Process-local TTL-keyed store.
pub struct LocalStore {
    entries: Arc<DashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    purged: AtomicU64,
    expired_swept: Arc<AtomicU64>,
    sweeper: tokio::task::JoinHandle<()>,
}

impl LocalStore {
    /// Create a store and start its background sweep task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: LocalStoreConfig) -> Self {
        let entries: Arc<DashMap<String, CacheEntry>> = Arc::new(DashMap::new());
        let expired_swept = Arc::new(AtomicU64::new(0));

        let sweeper = {
            let entries = Arc::clone(&entries);
            let expired_swept = Arc::clone(&expired_swept);
            let sweep_interval = config.sweep_interval;

            tokio::spawn(async move {
                let mut ticker = interval(sweep_interval);
                // The first tick fires immediately; skip it so a fresh store
                // is not swept before anything is written.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let before = entries.len();
                    entries.retain(|_, entry| !entry.is_expired());
                    let removed = before.saturating_sub(entries.len());
                    if removed > 0 {
                        expired_swept.fetch_add(removed as u64, Ordering::Relaxed);
                        counter!("cache_local_expired_swept").increment(removed as u64);
                        debug!(removed, "swept expired local cache entries");
                    }
                }
            })
        };

        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            purged: AtomicU64::new(0),
            expired_swept,
            sweeper,
        }
    }

    /// Look up a value. An expired entry behaves as a miss and is removed.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let hit = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value().value().to_vec()),
            Some(entry) => {
                drop(entry);
                // Only remove the entry we just observed as expired; a
                // concurrent fresh set must survive.
                self.entries.remove_if(key, |_, e| e.is_expired());
                None
            }
            None => None,
        };

        match hit {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                counter!("cache_local_hits").increment(1);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                counter!("cache_local_misses").increment(1);
                None
            }
        }
    }

    /// Store a value with the given TTL, replacing any previous entry.
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    /// Remove a single entry. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Purge every named key. Missing keys are a no-op, so delivering the
    /// same invalidation batch twice leaves the store in the same state.
    pub fn purge_keys(&self, keys: &[String]) -> usize {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.purged.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Number of entries currently held (expired-but-unswept included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> LocalStoreStats {
        LocalStoreStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            expired_swept: self.expired_swept.load(Ordering::Relaxed),
        }
    }
}

impl Drop for LocalStore {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn test_store() -> LocalStore {
        LocalStore::new(LocalStoreConfig::default())
    }

    #[tokio::test]
    async fn basic_operations() {
        let store = test_store();

        store.set("k", b"v".to_vec(), Duration::from_secs(60));
        assert_eq!(store.get("k"), Some(b"v".to_vec()));
        assert_eq!(store.len(), 1);

        assert!(store.delete("k"));
        assert!(!store.delete("k"));
        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_entry_reads_as_miss_and_is_removed() {
        let store = test_store();

        store.set("k", b"v".to_vec(), Duration::from_millis(50));
        assert_eq!(store.get("k"), Some(b"v".to_vec()));

        sleep(Duration::from_millis(80)).await;
        assert_eq!(store.get("k"), None);
        // Lazy removal happened on the read.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn set_replaces_entry_and_ttl() {
        let store = test_store();

        store.set("k", b"old".to_vec(), Duration::from_millis(30));
        store.set("k", b"new".to_vec(), Duration::from_secs(60));
        sleep(Duration::from_millis(60)).await;
        // The replacement's TTL applies, not the original's.
        assert_eq!(store.get("k"), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn purge_is_idempotent() {
        let store = test_store();

        store.set("a", b"1".to_vec(), Duration::from_secs(60));
        store.set("b", b"2".to_vec(), Duration::from_secs(60));
        store.set("c", b"3".to_vec(), Duration::from_secs(60));

        let batch = vec!["a".to_string(), "b".to_string(), "missing".to_string()];
        assert_eq!(store.purge_keys(&batch), 2);
        // Same message delivered again: no-op, same final state.
        assert_eq!(store.purge_keys(&batch), 0);

        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("c"), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn background_sweep_removes_expired_entries() {
        let store = LocalStore::new(LocalStoreConfig {
            sweep_interval: Duration::from_millis(50),
        });

        store.set("short", b"v".to_vec(), Duration::from_millis(20));
        store.set("long", b"v".to_vec(), Duration::from_secs(60));

        sleep(Duration::from_millis(150)).await;

        // The sweep removed the expired entry without any read touching it.
        assert_eq!(store.len(), 1);
        let stats = store.stats();
        assert!(stats.expired_swept >= 1);
    }

    #[tokio::test]
    async fn stats_track_hits_and_misses() {
        let store = test_store();

        store.set("k", b"v".to_vec(), Duration::from_secs(60));
        store.get("k");
        store.get("absent");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }
}
