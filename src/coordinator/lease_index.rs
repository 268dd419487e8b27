//! Bidirectional lease index.
//!
//! The lease manager needs two views of the same record set: lease id to
//! expiration term for renewal lookups, and expiration term to lease ids for
//! expiry scans. Keeping two raw maps in sync by hand is how the views
//! drift, so this module owns both and exposes only operations that update
//! them together. A lease id appears in the reverse index under exactly the
//! term the forward map stores for it, and nowhere else.

use crate::core::time::ClusterTime;
use crate::coordinator::lease::LeaseId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Forward and reverse views over the set of live lease records.
#[derive(Debug, Default)]
pub struct LeaseIndex {
    /// Lease id → expiration term.
    forward: HashMap<LeaseId, ClusterTime>,

    /// Expiration term → ids expiring at exactly that term.
    by_term: BTreeMap<ClusterTime, BTreeSet<LeaseId>>,
}

impl LeaseIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live leases.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Whether the index holds no leases.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of distinct expiration terms in the reverse view.
    pub fn term_buckets(&self) -> usize {
        self.by_term.len()
    }

    /// Whether `lease_id` is a live lease.
    pub fn contains(&self, lease_id: LeaseId) -> bool {
        self.forward.contains_key(&lease_id)
    }

    /// Expiration term of `lease_id`, if live.
    pub fn term_of(&self, lease_id: LeaseId) -> Option<ClusterTime> {
        self.forward.get(&lease_id).copied()
    }

    /// Insert a new lease record.
    ///
    /// The id must not already be live; new ids come from the allocation
    /// watermark and are never reused.
    pub fn insert(&mut self, lease_id: LeaseId, term: ClusterTime) {
        debug_assert!(!self.forward.contains_key(&lease_id));
        self.forward.insert(lease_id, term);
        self.by_term.entry(term).or_default().insert(lease_id);
    }

    /// Move a live lease to a new expiration term.
    ///
    /// Returns the previous term, or `None` if the id is not live (in which
    /// case the index is unchanged).
    pub fn renew(&mut self, lease_id: LeaseId, new_term: ClusterTime) -> Option<ClusterTime> {
        let old_term = *self.forward.get(&lease_id)?;
        self.remove_from_bucket(old_term, lease_id);
        self.forward.insert(lease_id, new_term);
        self.by_term.entry(new_term).or_default().insert(lease_id);
        Some(old_term)
    }

    /// Ids of leases whose term is at or before `cutoff`, in term order.
    pub fn expired_at(&self, cutoff: ClusterTime) -> Vec<LeaseId> {
        self.by_term
            .range(..=cutoff)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    /// Remove every lease whose term is at or before `cutoff`.
    ///
    /// Returns the removed ids in term order.
    pub fn remove_expired(&mut self, cutoff: ClusterTime) -> Vec<LeaseId> {
        let expired_terms: Vec<ClusterTime> =
            self.by_term.range(..=cutoff).map(|(term, _)| *term).collect();

        let mut removed = Vec::new();
        for term in expired_terms {
            if let Some(ids) = self.by_term.remove(&term) {
                for id in ids {
                    self.forward.remove(&id);
                    removed.push(id);
                }
            }
        }
        removed
    }

    fn remove_from_bucket(&mut self, term: ClusterTime, lease_id: LeaseId) {
        if let Some(ids) = self.by_term.get_mut(&term) {
            ids.remove(&lease_id);
            if ids.is_empty() {
                self.by_term.remove(&term);
            }
        }
    }
}
