use std::time::Duration;

use async_trait::async_trait;

use super::{KeyInfo, KvStore, MemoryKv};
use crate::error::StoreError;

/// Wraps a [`MemoryKv`] and fails selected operations.
#[derive(Debug, Default)]
pub struct FailingKv {
    pub inner: MemoryKv,
    pub fail_reads: bool,
    /// Writes to keys starting with this prefix fail.
    pub fail_writes_to: Option<String>,
}

impl FailingKv {
    fn unavailable() -> StoreError {
        StoreError::Backend("backend unavailable".to_string())
    }
}

#[async_trait]
impl KvStore for FailingKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        if let Some(prefix) = &self.fail_writes_to {
            if key.starts_with(prefix.as_str()) {
                return Err(Self::unavailable());
            }
        }
        self.inner.put(key, value, ttl).await
    }

    async fn put_new(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool, StoreError> {
        if let Some(prefix) = &self.fail_writes_to {
            if key.starts_with(prefix.as_str()) {
                return Err(Self::unavailable());
            }
        }
        self.inner.put_new(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KeyInfo>, StoreError> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        self.inner.list(prefix).await
    }
}

/// Wraps a [`MemoryKv`] and yields to the scheduler before every operation,
/// so concurrently polled callers interleave between store round trips.
#[derive(Debug, Default)]
pub struct YieldingKv {
    pub inner: MemoryKv,
}

#[async_trait]
impl KvStore for YieldingKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.put(key, value, ttl).await
    }

    async fn put_new(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool, StoreError> {
        tokio::task::yield_now().await;
        self.inner.put_new(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KeyInfo>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.list(prefix).await
    }
}
