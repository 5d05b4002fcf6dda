//! # Invalidation Module
//!
//! The distributed invalidation protocol: a broadcast bus carrying batches
//! of cache keys, and a per-replica subscriber that purges those keys from
//! the local store. The bus has no owner — every replica publishes when it
//! writes fresher values out of band, and every replica is always
//! subscribed.
//!
//! Delivery is best effort. Lost or duplicated messages are tolerated by
//! design: purges are idempotent, and an unreached replica converges on its
//! local TTL instead.

pub mod subscriber;
pub mod transport;

pub use subscriber::InvalidationSubscriber;
pub use transport::{BroadcastTransport, InvalidationTransport, RedisTransport};

use serde::{Deserialize, Serialize};

use crate::key::CacheKey;

/// A batch of cache keys announced as stale.
///
/// Wire format: flat JSON array of key strings under `keys`, published on a
/// single well-known channel. Stateless and transient — there is no ordering
/// requirement across messages, and purging the same key twice is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    /// The invalidated cache keys.
    pub keys: Vec<String>,
}

impl InvalidationMessage {
    /// Build a message from any collection of key strings.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a single-key message.
    pub fn single(key: &CacheKey) -> Self {
        Self {
            keys: vec![key.as_str().to_string()],
        }
    }
}
