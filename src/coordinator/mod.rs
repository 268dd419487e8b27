//! Coordinator time and lease components.
//!
//! This module contains:
//! - [`clock`] - Cluster clock and its safe-time updater
//! - [`lease`] - Client lease issuance and renewal
//! - [`lease_index`] - Bidirectional lease index
//!
//! [`Coordinator`] wires the components together for the embedding process.

pub mod clock;
pub mod lease;
pub mod lease_index;

use crate::core::config::Config;
use crate::coordinator::clock::ClusterClock;
use crate::coordinator::lease::LeaseManager;
use crate::storage::external::ExternalStorage;
use anyhow::{Context, Result};
use std::sync::Arc;

/// The coordinator's time and lease services, wired and running.
///
/// Bootstrap order matters: the clock recovers first so lease terms are
/// computed against recovered time, then its updater starts, then the lease
/// manager recovers and pre-warms allocation headroom.
#[derive(Debug)]
pub struct Coordinator {
    config: Arc<Config>,
    clock: Arc<ClusterClock>,
    leases: Arc<LeaseManager>,
}

impl Coordinator {
    /// Recover both components from external storage and start background
    /// maintenance.
    pub async fn bootstrap(config: Config, storage: Arc<dyn ExternalStorage>) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let clock = Arc::new(
            ClusterClock::recover(storage.clone(), config.clock.clone())
                .await
                .context("failed to recover cluster time")?,
        );
        clock.start_updater();

        let leases = Arc::new(
            LeaseManager::recover(storage, clock.clone(), config.lease.clone())
                .await
                .context("failed to recover lease allocation")?,
        );
        leases
            .preallocate(config.lease.preallocation_slack)
            .await
            .context("failed to pre-warm lease allocation")?;

        tracing::info!("coordinator time and lease services ready");
        Ok(Self {
            config: Arc::new(config),
            clock,
            leases,
        })
    }

    /// Bootstrap without starting the updater or pre-warming allocation.
    /// Used by tests that need deterministic control over both.
    pub async fn bootstrap_for_tests(
        config: Config,
        storage: Arc<dyn ExternalStorage>,
    ) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let clock = Arc::new(
            ClusterClock::recover(storage.clone(), config.clock.clone())
                .await
                .context("failed to recover cluster time")?,
        );
        let leases = Arc::new(
            LeaseManager::recover(storage, clock.clone(), config.lease.clone())
                .await
                .context("failed to recover lease allocation")?,
        );

        Ok(Self {
            config: Arc::new(config),
            clock,
            leases,
        })
    }

    /// The configuration this coordinator was bootstrapped with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The cluster clock.
    pub fn clock(&self) -> &Arc<ClusterClock> {
        &self.clock
    }

    /// The lease manager.
    pub fn leases(&self) -> &Arc<LeaseManager> {
        &self.leases
    }

    /// Stop background maintenance, blocking until it has ceased.
    pub async fn shutdown(&self) {
        self.clock.stop_updater().await;
        tracing::info!("coordinator time and lease services stopped");
    }
}
