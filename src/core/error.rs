//! Error types.
//!
//! Meridian distinguishes failures that must surface to the caller from
//! conditions that are part of normal operation. An unavailable external
//! store is an error and propagates; a clock that has not yet established a
//! safe watermark is not an error, it reports [`ClusterTime::ZERO`] and
//! callers retry. An absent key during recovery is the expected cold-start
//! condition and never produces an error.
//!
//! [`ClusterTime::ZERO`]: crate::core::time::ClusterTime::ZERO

use crate::storage::external::StorageError;
use thiserror::Error;

/// Common Meridian error conditions.
#[derive(Debug, Error)]
pub enum MeridianError {
    /// An external storage operation failed.
    ///
    /// For lease allocation this is fail-closed: the triggering call returns
    /// this error and no identifier past the last confirmed allocation
    /// watermark is issued.
    #[error("external storage: {0}")]
    Storage(#[from] StorageError),
}

impl MeridianError {
    /// Check if this error indicates the operation should be retried.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Storage(StorageError::Unavailable { .. })
        )
    }
}

/// Result type using MeridianError.
pub type MeridianResult<T> = Result<T, MeridianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_is_retriable() {
        let err = MeridianError::Storage(StorageError::unavailable("k", "connection reset"));
        assert!(err.is_retriable());
    }

    #[test]
    fn corrupt_is_not_retriable() {
        let err = MeridianError::Storage(StorageError::Corrupt {
            key: "k".to_string(),
            expected: 8,
            found: 3,
        });
        assert!(!err.is_retriable());
    }

    #[test]
    fn display_includes_key() {
        let err = MeridianError::Storage(StorageError::unavailable("coordinatorClusterClock", "timeout"));
        assert!(err.to_string().contains("coordinatorClusterClock"));
    }
}
