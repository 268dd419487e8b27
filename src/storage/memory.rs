//! In-process external storage.
//!
//! `MemoryStorage` implements [`ExternalStorage`] over a guarded map. It is
//! durable only for the life of the process, which is exactly what tests
//! need to model a coordinator crash: drop the components, keep the storage,
//! recover. Failure injection lets tests exercise the fail-closed paths
//! without a real storage outage.

use crate::storage::external::{ExternalStorage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct MemoryInner {
    data: HashMap<String, Bytes>,
    /// Operation log, e.g. `set(coordinatorClusterClock)`.
    log: Vec<String>,
    fail_gets: u32,
    fail_sets: u32,
}

/// In-memory [`ExternalStorage`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value directly, without logging the operation. Used to model
    /// state left behind by a previous coordinator incarnation.
    pub fn seed(&self, key: &str, value: Bytes) {
        self.inner.lock().data.insert(key.to_string(), value);
    }

    /// Read a value directly, without logging the operation.
    pub fn peek(&self, key: &str) -> Option<Bytes> {
        self.inner.lock().data.get(key).cloned()
    }

    /// Make the next `n` `get` calls fail with `Unavailable`.
    pub fn fail_next_gets(&self, n: u32) {
        self.inner.lock().fail_gets = n;
    }

    /// Make the next `n` `set` calls fail with `Unavailable`.
    ///
    /// The failed write is not applied: the stored value stays whatever it
    /// was, matching a write that never reached the storage service.
    pub fn fail_next_sets(&self, n: u32) {
        self.inner.lock().fail_sets = n;
    }

    /// Drain and return the operation log.
    pub fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.lock().log)
    }
}

#[async_trait]
impl ExternalStorage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let mut inner = self.inner.lock();
        inner.log.push(format!("get({})", key));
        if inner.fail_gets > 0 {
            inner.fail_gets -= 1;
            return Err(StorageError::unavailable(key, "injected get failure"));
        }
        Ok(inner.data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.log.push(format!("set({})", key));
        if inner.fail_sets > 0 {
            inner.fail_sets -= 1;
            return Err(StorageError::unavailable(key, "injected set failure"));
        }
        inner.data.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::external::{decode_u64, encode_u64, keys};

    #[tokio::test]
    async fn get_absent_returns_none() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let storage = MemoryStorage::new();
        storage
            .set(keys::CLUSTER_CLOCK, encode_u64(4500))
            .await
            .unwrap();
        let raw = storage.get(keys::CLUSTER_CLOCK).await.unwrap().unwrap();
        assert_eq!(decode_u64(keys::CLUSTER_CLOCK, raw).unwrap(), 4500);
    }

    #[tokio::test]
    async fn injected_set_failure_leaves_value_unchanged() {
        let storage = MemoryStorage::new();
        storage.set("k", Bytes::from_static(b"old")).await.unwrap();

        storage.fail_next_sets(1);
        let err = storage.set("k", Bytes::from_static(b"new")).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert_eq!(storage.peek("k").unwrap(), Bytes::from_static(b"old"));

        // The injection is consumed; the following write succeeds.
        storage.set("k", Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(storage.peek("k").unwrap(), Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn operations_are_logged() {
        let storage = MemoryStorage::new();
        storage.set("a", Bytes::new()).await.unwrap();
        let _ = storage.get("b").await.unwrap();
        assert_eq!(storage.take_log(), vec!["set(a)", "get(b)"]);
        assert!(storage.take_log().is_empty());
    }

    #[tokio::test]
    async fn seed_bypasses_log() {
        let storage = MemoryStorage::new();
        storage.seed("k", encode_u64(7));
        assert!(storage.take_log().is_empty());
        assert_eq!(storage.peek("k"), Some(encode_u64(7)));
    }
}
