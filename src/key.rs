//! # Cache Key Module
//!
//! Deterministic cache key construction. A key is a namespace followed by an
//! ordered list of parameters, joined with `:` — for example
//! `pair:0xabc123:firstTokenPrice`. Identical logical queries must always
//! serialize to identical keys, across processes and releases, so that
//! remote store hits are shared by the whole fleet.
//!
//! Keys longer than [`MAX_KEY_LEN`] are folded to
//! `<namespace>:<sha256-hex>` of the full key, which keeps them
//! deterministic while staying friendly to the remote store.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator between the namespace and each parameter.
pub const KEY_SEPARATOR: char = ':';

/// Maximum length of a built key before it is folded through a hash.
pub const MAX_KEY_LEN: usize = 250;

/// A fully-built cache key.
///
/// Construction goes through [`KeyBuilder`] (or [`build_key`]) so every key
/// in the process follows the same format. Parameters should not themselves
/// contain `:`; the builder does not escape them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// View the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Builder for deterministic cache keys.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    namespace: String,
    parts: Vec<String>,
}

impl KeyBuilder {
    /// Start a key in the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            parts: Vec::new(),
        }
    }

    /// Append one parameter. Parameter order is significant.
    pub fn push(mut self, part: impl fmt::Display) -> Self {
        self.parts.push(part.to_string());
        self
    }

    /// Build the final key, folding over-length keys through SHA-256.
    pub fn build(self) -> CacheKey {
        let mut key = self.namespace;
        for part in &self.parts {
            key.push(KEY_SEPARATOR);
            key.push_str(part);
        }

        if key.len() <= MAX_KEY_LEN {
            return CacheKey(key);
        }

        // Over-length keys keep the namespace readable and fold the rest.
        let namespace_end = key.find(KEY_SEPARATOR).unwrap_or(key.len());
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());
        CacheKey(format!("{}{}{}", &key[..namespace_end], KEY_SEPARATOR, digest))
    }
}

/// Convenience wrapper for keys whose parameters are already strings.
pub fn build_key(namespace: &str, parts: &[&str]) -> CacheKey {
    let mut builder = KeyBuilder::new(namespace);
    for part in parts {
        builder = builder.push(part);
    }
    builder.build()
}
