//! External storage interface.
//!
//! The coordinator stores the state that must survive a crash in an external
//! consistent storage service: a durable, linearizable key-value store with
//! single-key atomic writes, reachable by every coordinator replica. The
//! service itself (typically a consensus cluster) is outside this crate;
//! Meridian only depends on the [`ExternalStorage`] contract.
//!
//! Two rules the contract imposes on callers:
//! - A failed `set` must never be treated as success. The caller must not
//!   advance any in-memory watermark until the write is confirmed.
//! - An absent key (`get` returning `None`) means "never written" and is the
//!   expected cold-start condition, not an error.

use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Well-known keys under which the coordinator persists recovery state.
pub mod keys {
    /// Safe cluster-time watermark, written by the clock's periodic updater
    /// and read once at startup.
    pub const CLUSTER_CLOCK: &str = "coordinatorClusterClock";

    /// Lease allocation watermark, written every time allocation headroom is
    /// extended and read once at startup.
    pub const LEASE_ALLOCATION: &str = "coordinatorLeaseAllocation";
}

/// Errors surfaced by external storage operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The storage service could not complete the operation.
    #[error("storage unavailable for key {key}: {reason}")]
    Unavailable { key: String, reason: String },

    /// A stored value did not have the expected shape.
    #[error("corrupt value under key {key}: expected {expected} bytes, found {found}")]
    Corrupt {
        key: String,
        expected: usize,
        found: usize,
    },
}

impl StorageError {
    /// Create an Unavailable error for the given key.
    pub fn unavailable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable, linearizable key-value storage shared by coordinator replicas.
///
/// Implementations must guarantee that a value confirmed by `set` is visible
/// to any future coordinator instance calling `get`, across process and
/// machine failures. Calls are synchronous from the caller's point of view
/// and may block for a network round trip.
#[async_trait]
pub trait ExternalStorage: Send + Sync + std::fmt::Debug {
    /// Read the value under `key`. `None` means the key was never written.
    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>>;

    /// Durably write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Bytes) -> StorageResult<()>;
}

/// Encode a watermark as a fixed-width big-endian value.
pub fn encode_u64(value: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u64(value);
    buf.freeze()
}

/// Decode a fixed-width big-endian watermark read from `key`.
pub fn decode_u64(key: &str, mut value: Bytes) -> StorageResult<u64> {
    if value.len() != 8 {
        return Err(StorageError::Corrupt {
            key: key.to_string(),
            expected: 8,
            found: value.len(),
        });
    }
    Ok(value.get_u64())
}
