//! # Error Handling Module
//!
//! Error taxonomy for the cache subsystem. Every variant carries an owned
//! message and the enum is `Clone`, so a single failure can be handed to
//! every waiter coalesced onto the same in-flight computation.
//!
//! The taxonomy maps directly onto the recovery policies in the cache
//! service:
//! - `Remote` is transient: reads degrade to the value factory, writes are
//!   logged and skipped.
//! - `Upstream` (factory failure) always propagates and is never cached.
//! - `Serialization` skips the store writes but the computed value is still
//!   served.
//! - `Transport` degrades invalidation to TTL-only convergence.

use thiserror::Error;

/// Result type used throughout the cache subsystem.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The shared remote store is unreachable, timed out, or rejected an
    /// operation. Always considered transient.
    #[error("remote store error: {message}")]
    Remote { message: String },

    /// The value factory failed. Surfaced to every caller waiting on the
    /// same key; never written to either store.
    #[error("upstream compute error: {message}")]
    Upstream { message: String },

    /// A value could not be encoded for storage or decoded from it.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// The invalidation bus failed to publish or subscribe.
    #[error("invalidation transport error: {message}")]
    Transport { message: String },

    /// A cache key could not be built or validated.
    #[error("cache key error: {message}")]
    Key { message: String },

    /// Invalid or incomplete configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    /// Create a remote store error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create an upstream compute error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an invalidation transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a cache key error.
    pub fn key(message: impl Into<String>) -> Self {
        Self::Key {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the caller may reasonably retry the operation as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Remote { .. } | Self::Transport { .. })
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Remote {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
