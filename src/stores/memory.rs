//! # In-Process Remote Store
//!
//! A [`RemoteStore`] backed by a shared in-process map. Tests use it to let
//! several cache services share one "remote" tier without a network; it also
//! serves single-node deployments that want the cache API without running a
//! store server. Entries expire lazily on access.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheEntry, RemoteStore};
use crate::core::error::CacheResult;

/// Shared-map implementation of [`RemoteStore`].
///
/// Cloning yields a handle onto the same underlying map, mirroring how two
/// replicas would share one Redis instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryRemoteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held (expired-but-unread included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value().value().to_vec())),
            Some(entry) => {
                drop(entry);
                self.entries.remove_if(key, |_, e| e.is_expired());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        let mut removed = 0;
        for key in keys {
            if self.entries.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn ping(&self) -> CacheResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn basic_operations() {
        let store = MemoryRemoteStore::new();

        store.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        let removed = store.delete_many(&["k".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire() {
        let store = MemoryRemoteStore::new();

        store
            .set("k", b"v", Duration::from_millis(40))
            .await
            .unwrap();
        sleep(Duration::from_millis(70)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_the_same_map() {
        let store = MemoryRemoteStore::new();
        let other_replica_view = store.clone();

        store.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(
            other_replica_view.get("k").await.unwrap(),
            Some(b"v".to_vec())
        );
    }

    #[tokio::test]
    async fn delete_many_counts_only_present_keys() {
        let store = MemoryRemoteStore::new();
        store.set("a", b"1", Duration::from_secs(60)).await.unwrap();

        let removed = store
            .delete_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }
}
