//! # Cached Combinator
//!
//! Wraps an async function in a caching boundary that is visible at the call
//! site: a key function, a TTL pair, and the factory are bound once, and
//! every `call` goes through [`CacheClient::get_or_set`]. Domain services
//! build one of these per upstream query instead of annotating methods.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::core::error::CacheResult;
use crate::key::CacheKey;
use crate::service::{CacheClient, TtlPair};

/// A cache-wrapped async function.
///
/// `key_fn` derives the deterministic cache key from the argument; `factory`
/// produces the value on a full miss. Both are plain functions, so the
/// caching boundary stays explicit in code.
pub struct Cached<C, K, F> {
    client: Arc<C>,
    ttl: TtlPair,
    key_fn: K,
    factory: F,
}

impl<C, K, F> Cached<C, K, F> {
    /// Bind a key function, TTL policy, and factory to a cache client.
    pub fn new(client: Arc<C>, ttl: TtlPair, key_fn: K, factory: F) -> Self {
        Self {
            client,
            ttl,
            key_fn,
            factory,
        }
    }
}

impl<C, K, F> Cached<C, K, F>
where
    C: CacheClient,
{
    /// Invoke the wrapped function through the cache.
    pub async fn call<A, T, Fut>(&self, arg: A) -> CacheResult<T>
    where
        K: Fn(&A) -> CacheKey,
        F: Fn(A) -> Fut + Clone + Send + 'static,
        A: Send + 'static,
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let key = (self.key_fn)(&arg);
        let factory = self.factory.clone();
        self.client
            .get_or_set(&key, self.ttl, move || factory(arg))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LocalStoreConfig;
    use crate::invalidation::{BroadcastTransport, InvalidationTransport};
    use crate::key::KeyBuilder;
    use crate::service::CacheService;
    use crate::stores::{LocalStore, MemoryRemoteStore, RemoteStore};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_service() -> Arc<CacheService> {
        Arc::new(CacheService::new(
            Arc::new(LocalStore::new(LocalStoreConfig::default())),
            Arc::new(MemoryRemoteStore::new()) as Arc<dyn RemoteStore>,
            Arc::new(BroadcastTransport::default()) as Arc<dyn InvalidationTransport>,
        ))
    }

    #[tokio::test]
    async fn repeated_calls_hit_the_cache() {
        let service = test_service();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_factory = Arc::clone(&calls);
        let first_token_price = Cached::new(
            service,
            TtlPair::fast(),
            |pair: &String| {
                KeyBuilder::new("pair")
                    .push(pair)
                    .push("firstTokenPrice")
                    .build()
            },
            move |_pair: String| {
                let calls = Arc::clone(&calls_in_factory);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1.25f64)
                }
            },
        );

        let a = first_token_price.call("0xabc".to_string()).await.unwrap();
        let b = first_token_price.call("0xabc".to_string()).await.unwrap();

        assert_eq!(a, 1.25);
        assert_eq!(b, 1.25);
        // The second call was a local hit; the factory ran once.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_arguments_compute_separately() {
        let service = test_service();
        let calls = Arc::new(AtomicU32::new(0));

        let calls_in_factory = Arc::clone(&calls);
        let decimals = Cached::new(
            service,
            TtlPair::metadata(),
            |token: &String| KeyBuilder::new("token").push(token).push("decimals").build(),
            move |token: String| {
                let calls = Arc::clone(&calls_in_factory);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(token.len() as u32)
                }
            },
        );

        assert_eq!(decimals.call("0xabc".to_string()).await.unwrap(), 5);
        assert_eq!(decimals.call("0xlonger".to_string()).await.unwrap(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
