//! Key-value store adapters.
//!
//! Everything the bookmark record touches goes through [`KvStore`]: a flat
//! string keyspace with optional per-entry expiry. Two backends ship with the
//! crate and are picked once at startup:
//!
//! - [`LibsqlKv`] keeps entries in a `kv` table of a local libsql database,
//!   optionally an embedded replica synced to Turso.
//! - [`MemoryKv`] keeps entries in process memory. Used by tests and by
//!   deployments that run without a database.

mod database;
mod memory;

#[cfg(test)]
pub(crate) mod testing;

pub use database::LibsqlKv;
pub use memory::MemoryKv;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns `None` for absent and expired keys.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value`, replacing any previous entry. With a `ttl` the entry
    /// stops being visible once the duration has elapsed.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Stores `value` only if `key` is absent or expired, atomically with
    /// respect to other writers. Returns `false` when the key was taken.
    async fn put_new(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool, StoreError>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Live keys starting with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<KeyInfo>, StoreError>;
}

/// Decodes a stored JSON value, treating malformed input as absent.
pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = key, error = %e, "ignoring malformed json in kv store");
            None
        }
    }
}

pub async fn get_json<T: DeserializeOwned>(
    kv: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    Ok(kv.get(key).await?.and_then(|raw| decode(key, &raw)))
}

pub async fn put_json<T: Serialize>(
    kv: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(value)?;
    kv.put(key, &encoded, ttl).await
}

/// Expiry instant for an entry written at `now`. A ttl too large to
/// represent is treated as no expiry.
pub(crate) fn expiry_from(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let delta = TimeDelta::from_std(ttl?).ok()?;
    now.checked_add_signed(delta)
}
