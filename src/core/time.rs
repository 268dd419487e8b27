//! Cluster time representation.
//!
//! Meridian measures cluster time in logical milliseconds. The value has no
//! wall-clock meaning; the only property callers may rely on is that time
//! read from the coordinator never decreases over the lifetime of the
//! cluster, including across coordinator crashes.

use serde::{Deserialize, Serialize};

/// A logical cluster timestamp in milliseconds.
///
/// `ClusterTime::ZERO` is a sentinel meaning "no usable time yet": the
/// coordinator clock returns it until a safe watermark has been persisted or
/// recovered. Callers must never compare `ZERO` against other timestamps as
/// if it carried ordering information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterTime {
    /// Milliseconds since the cluster's first start.
    pub ms: u64,
}

impl ClusterTime {
    /// The "no usable time yet" sentinel.
    pub const ZERO: ClusterTime = ClusterTime { ms: 0 };

    /// Create a cluster time with the given millisecond value.
    pub const fn new(ms: u64) -> Self {
        Self { ms }
    }

    /// Add milliseconds to this time.
    pub const fn add_ms(self, ms: u64) -> Self {
        Self { ms: self.ms + ms }
    }

    /// Subtract milliseconds from this time, saturating at zero.
    pub const fn saturating_sub_ms(self, ms: u64) -> Self {
        Self {
            ms: self.ms.saturating_sub(ms),
        }
    }

    /// Whether this is the `ZERO` sentinel.
    pub const fn is_zero(self) -> bool {
        self.ms == 0
    }

    /// Check if this time is at or after the given deadline.
    pub const fn is_at_or_after(self, deadline: ClusterTime) -> bool {
        self.ms >= deadline.ms
    }

    /// The smaller of two cluster times.
    pub const fn min(self, other: ClusterTime) -> Self {
        if self.ms <= other.ms {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for ClusterTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.ms)
    }
}
