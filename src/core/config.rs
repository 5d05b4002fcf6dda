//! # Configuration Module
//!
//! Configuration for the two cache tiers and the invalidation bus.
//!
//! ## Key Features
//! - YAML configuration parsing with serde
//! - Environment variable override support
//! - Validation with detailed error messages
//!
//! The remote store endpoint and the invalidation bus endpoint are always
//! injected through this structure; nothing in the crate hard-codes a
//! connection target. They are configured separately because deployments
//! commonly point them at different Redis instances (a large keyspace node
//! for values, a small low-latency node for pub/sub).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::error::{CacheError, CacheResult};

/// Environment variable overriding the remote store endpoint.
pub const ENV_REMOTE_URL: &str = "CHAIN_CACHE_REMOTE_URL";

/// Environment variable overriding the invalidation bus endpoint.
pub const ENV_BUS_URL: &str = "CHAIN_CACHE_BUS_URL";

/// Environment variable overriding the invalidation channel name.
pub const ENV_CHANNEL: &str = "CHAIN_CACHE_CHANNEL";

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Process-local store configuration.
    pub local: LocalStoreConfig,

    /// Shared remote store configuration.
    pub remote: RemoteStoreConfig,

    /// Invalidation bus configuration.
    pub invalidation: InvalidationConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local: LocalStoreConfig::default(),
            remote: RemoteStoreConfig::default(),
            invalidation: InvalidationConfig::default(),
        }
    }
}

/// Process-local store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreConfig {
    /// How often the background sweep removes expired entries.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Shared remote store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteStoreConfig {
    /// Redis connection URL.
    pub url: String,

    /// Prefix applied to every key written to the remote store.
    pub key_prefix: String,

    /// Timeout for establishing the initial connection.
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,

    /// Maximum number of retries per operation.
    pub max_retries: u32,

    /// Base delay between retries (scaled linearly by attempt number).
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "chain-cache:".to_string(),
            connection_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Invalidation bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvalidationConfig {
    /// Redis connection URL for the pub/sub channel.
    pub url: String,

    /// Channel carrying invalidation messages. Must be identical across
    /// every replica for purges to reach all local stores.
    pub channel: String,

    /// Delay before re-subscribing after the message stream is lost.
    #[serde(with = "humantime_serde")]
    pub reconnect_backoff: Duration,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            channel: "chain-cache:invalidate".to_string(),
            reconnect_backoff: Duration::from_secs(1),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            CacheError::configuration(format!("failed to read config file: {}", e))
        })?;

        let mut config: CacheConfig = serde_yaml::from_str(&content)
            .map_err(|e| CacheError::configuration(format!("failed to parse config: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides for the injected endpoints.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_REMOTE_URL) {
            self.remote.url = url;
        }
        if let Ok(url) = std::env::var(ENV_BUS_URL) {
            self.invalidation.url = url;
        }
        if let Ok(channel) = std::env::var(ENV_CHANNEL) {
            self.invalidation.channel = channel;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CacheResult<()> {
        if self.remote.url.is_empty() {
            return Err(CacheError::configuration("remote store URL is empty"));
        }
        if !self.remote.url.starts_with("redis://") && !self.remote.url.starts_with("rediss://") {
            return Err(CacheError::configuration(format!(
                "remote store URL must be a redis:// or rediss:// URL, got: {}",
                self.remote.url
            )));
        }
        if self.invalidation.url.is_empty() {
            return Err(CacheError::configuration("invalidation bus URL is empty"));
        }
        if self.invalidation.channel.is_empty() {
            return Err(CacheError::configuration(
                "invalidation channel name is empty",
            ));
        }
        if self.local.sweep_interval.is_zero() {
            return Err(CacheError::configuration(
                "local sweep interval must be greater than zero",
            ));
        }
        if self.remote.key_prefix.is_empty() {
            return Err(CacheError::configuration("remote key prefix is empty"));
        }
        Ok(())
    }
}
