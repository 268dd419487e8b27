//! Client lease management.
//!
//! The coordinator issues every client a lease: a unique id and an
//! expiration term in cluster time. Other coordinator subsystems use the
//! lease to detect and reject stale or duplicate client requests, so two
//! guarantees must hold across coordinator crashes:
//! - lease ids are strictly increasing and never reissued, and
//! - an id is handed to a client only after its slot was durably reserved.
//!
//! The second guarantee is write-ahead allocation: an allocation watermark
//! in external storage always covers the highest id ever issued. When the
//! issued ids catch up to the watermark, the watermark is advanced and
//! persisted before the next id is assigned. A crash between the write and
//! the assignment wastes a reserved id; it can never reuse one.

use crate::core::config::LeaseConfig;
use crate::core::error::MeridianResult;
use crate::core::time::ClusterTime;
use crate::coordinator::clock::ClusterClock;
use crate::coordinator::lease_index::LeaseIndex;
use crate::storage::external::{decode_u64, encode_u64, keys, ExternalStorage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Client lease identifier. `0` means "no lease yet"; it is never issued.
pub type LeaseId = u64;

/// A lease as returned to RPC callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientLease {
    /// Unique lease identifier.
    pub lease_id: LeaseId,
    /// Cluster time at which the lease expires unless renewed.
    pub lease_term: ClusterTime,
}

/// Lease manager state guarded by the component lock.
#[derive(Debug)]
struct LeaseState {
    /// Highest lease id handed to any client so far. Not persisted; reset
    /// to the allocation watermark on recovery so ids below the watermark
    /// are never issued twice.
    last_issued: LeaseId,

    /// Highest lease id durably reserved in external storage. Always at
    /// least `last_issued`.
    max_allocated: LeaseId,

    /// Live lease records.
    index: LeaseIndex,
}

/// Snapshot of lease manager state for observability.
#[derive(Debug, Clone)]
pub struct LeaseStats {
    /// Number of live leases.
    pub active_leases: usize,
    /// Distinct expiration terms among live leases.
    pub term_buckets: usize,
    /// Highest lease id issued so far.
    pub last_issued: LeaseId,
    /// Highest lease id durably reserved.
    pub max_allocated: LeaseId,
}

/// Issues and renews client leases.
///
/// Thread-safe; a single lock serializes all operations, held across the
/// external storage round trip when the allocation watermark is extended so
/// concurrent callers can never observe a torn watermark.
#[derive(Debug)]
pub struct LeaseManager {
    storage: Arc<dyn ExternalStorage>,
    clock: Arc<ClusterClock>,
    config: LeaseConfig,
    state: Mutex<LeaseState>,
}

impl LeaseManager {
    /// Construct a lease manager, recovering the allocation watermark.
    ///
    /// With no stored watermark the manager starts fresh; otherwise issuance
    /// resumes strictly above the recovered watermark, which covers every id
    /// any previous incarnation could have issued.
    pub async fn recover(
        storage: Arc<dyn ExternalStorage>,
        clock: Arc<ClusterClock>,
        config: LeaseConfig,
    ) -> MeridianResult<Self> {
        let max_allocated = match storage.get(keys::LEASE_ALLOCATION).await? {
            None => 0,
            Some(raw) => decode_u64(keys::LEASE_ALLOCATION, raw)?,
        };
        if max_allocated == 0 {
            tracing::info!("no stored lease allocation; starting fresh");
        } else {
            tracing::info!(max_allocated, "recovered lease allocation watermark");
        }

        Ok(Self {
            storage,
            clock,
            config,
            state: Mutex::new(LeaseState {
                last_issued: max_allocated,
                max_allocated,
                index: LeaseIndex::new(),
            }),
        })
    }

    /// Issue a new lease or renew an existing one.
    ///
    /// `lease_id == 0` or an id that is not live requests a brand-new
    /// lease. Renewal keeps the id and moves the expiration term forward to
    /// the current cluster time plus the configured lease term.
    ///
    /// Fail-closed: if extending the allocation watermark fails at the
    /// storage layer, the error propagates and no id is assigned.
    pub async fn renew_lease(&self, lease_id: LeaseId) -> MeridianResult<ClientLease> {
        let mut state = self.state.lock().await;

        if lease_id != 0 && state.index.contains(lease_id) {
            let lease_term = self.next_term().await;
            state.index.renew(lease_id, lease_term);
            return Ok(ClientLease {
                lease_id,
                lease_term,
            });
        }

        // Brand-new lease. Reserve headroom durably before assigning.
        if state.last_issued == state.max_allocated {
            self.extend_allocation(&mut state).await?;
        }
        state.last_issued += 1;
        let lease_id = state.last_issued;
        debug_assert!(state.last_issued <= state.max_allocated);

        let lease_term = self.next_term().await;
        state.index.insert(lease_id, lease_term);
        tracing::debug!(lease_id, lease_term = %lease_term, "issued new lease");

        Ok(ClientLease {
            lease_id,
            lease_term,
        })
    }

    /// Durably reserve one more lease id.
    ///
    /// Advances the allocation watermark by exactly one unit, persisting it
    /// before returning. Maintenance code may call this repeatedly to build
    /// headroom so subsequent [`renew_lease`](Self::renew_lease) calls need
    /// no storage round trip.
    pub async fn allocate_next_lease(&self) -> MeridianResult<()> {
        let mut state = self.state.lock().await;
        self.extend_allocation(&mut state).await
    }

    /// Reserve ids until at least `slack` unissued ids are on hand.
    pub async fn preallocate(&self, slack: u64) -> MeridianResult<()> {
        let mut state = self.state.lock().await;
        while state.max_allocated - state.last_issued < slack {
            self.extend_allocation(&mut state).await?;
        }
        Ok(())
    }

    /// Look up a live lease.
    pub async fn get_lease(&self, lease_id: LeaseId) -> Option<ClientLease> {
        let state = self.state.lock().await;
        state.index.term_of(lease_id).map(|lease_term| ClientLease {
            lease_id,
            lease_term,
        })
    }

    /// Number of live leases.
    pub async fn lease_count(&self) -> usize {
        self.state.lock().await.index.len()
    }

    /// Ids of leases expired at `now`, oldest term first. Read-only.
    pub async fn expired_leases(&self, now: ClusterTime) -> Vec<LeaseId> {
        self.state.lock().await.index.expired_at(now)
    }

    /// Remove every lease expired at `now`, returning the removed ids.
    ///
    /// When to sweep is the embedding coordinator's decision; no timer is
    /// attached here.
    pub async fn remove_expired(&self, now: ClusterTime) -> Vec<LeaseId> {
        let mut state = self.state.lock().await;
        let removed = state.index.remove_expired(now);
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), now = %now, "removed expired leases");
        }
        removed
    }

    /// Snapshot lease manager state for observability.
    pub async fn stats(&self) -> LeaseStats {
        let state = self.state.lock().await;
        LeaseStats {
            active_leases: state.index.len(),
            term_buckets: state.index.term_buckets(),
            last_issued: state.last_issued,
            max_allocated: state.max_allocated,
        }
    }

    async fn next_term(&self) -> ClusterTime {
        self.clock
            .get_time()
            .await
            .add_ms(self.config.lease_term_ms)
    }

    /// Advance the allocation watermark by one, persisting the new value
    /// before any in-memory state changes. Called with the component lock
    /// held.
    async fn extend_allocation(&self, state: &mut LeaseState) -> MeridianResult<()> {
        let next = state.max_allocated + 1;
        self.storage
            .set(keys::LEASE_ALLOCATION, encode_u64(next))
            .await?;
        state.max_allocated = next;
        Ok(())
    }
}
