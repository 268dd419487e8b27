//! Meridian - coordinator cluster time and client lease service.
//!
//! Meridian is the coordinator-side subsystem of a distributed storage
//! system that owns cluster time and client leases. It gives every other
//! coordinator subsystem two guarantees that survive coordinator crash and
//! restart:
//!
//! 1. **Monotonic cluster time** - a logical millisecond timestamp that
//!    never goes backward across restarts, served cheaply from local state
//!    and bounded by a safety watermark persisted in external storage.
//! 2. **Unique lease ids** - client lease identifiers that are strictly
//!    increasing and never reissued, with each id durably reserved before
//!    it is handed out.
//!
//! Both components persist their recovery state in an external consistent
//! storage service (a linearizable key-value store reachable by all
//! coordinator replicas); the service itself is outside this crate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              RPC handlers (embedding process)           │
//! └─────────────────────────────────────────────────────────┘
//!         │ renew_lease                   │ get_time
//! ┌───────▼───────────────┐      ┌────────▼────────────────┐
//! │     LeaseManager      │─────▶│      ClusterClock       │
//! │  ids + expiry terms   │      │  safe-time watermark    │
//! └───────┬───────────────┘      └────────┬────────────────┘
//!         │ allocation watermark          │ clock watermark
//! ┌───────▼───────────────────────────────▼────────────────┐
//! │         External storage (linearizable KV)              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::error`] - Error types
//! - [`core::time`] - Cluster time representation
//! - [`coordinator::clock`] - Cluster clock and safe-time updater
//! - [`coordinator::lease`] - Client lease issuance and renewal
//! - [`coordinator::lease_index`] - Bidirectional lease index
//! - [`storage::external`] - External storage interface and value codec
//! - [`storage::memory`] - In-process storage for tests and embedded use
//!
//! # Key Invariants
//!
//! - The safe watermark is persisted before any time at or beyond the
//!   previous watermark is reported; recovery resumes from the watermark,
//!   so cluster time never moves backward.
//! - The allocation watermark is persisted before any id it covers is
//!   issued; recovery resumes issuance strictly above the watermark, so a
//!   lease id is never reissued.
//! - The forward and reverse lease views always describe the same record
//!   set; only invariant-preserving operations touch them.

// Core infrastructure
pub mod core;

// Coordinator time and lease components
pub mod coordinator;

// External storage layer
pub mod storage;

// Re-exports for convenience
pub use self::core::{config, error, time};
pub use coordinator::{clock, lease, lease_index};
pub use storage::{external, memory};
