//! Configuration parsing and validation.
//!
//! Meridian configuration is loaded from TOML. Every field has a default
//! tuned for a production coordinator; embedding processes typically load a
//! file and override a handful of values for testing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Meridian configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Cluster clock configuration.
    #[serde(default)]
    pub clock: ClockConfig,

    /// Client lease configuration.
    #[serde(default)]
    pub lease: LeaseConfig,
}

/// Cluster clock configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Interval in milliseconds between safe-watermark updates.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Amount in milliseconds by which each persisted watermark leads the
    /// current estimate. Must exceed the update interval by enough to cover
    /// the external storage round trip, or the clock stalls at the watermark
    /// between updates.
    #[serde(default = "default_safety_margin_ms")]
    pub safety_margin_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            safety_margin_ms: default_safety_margin_ms(),
        }
    }
}

/// Client lease configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Lease validity in milliseconds; a renewed lease expires this far
    /// past the cluster time at renewal.
    #[serde(default = "default_lease_term_ms")]
    pub lease_term_ms: u64,

    /// Number of lease ids to reserve ahead of demand at startup, so the
    /// first renewals need no storage round trip.
    #[serde(default = "default_preallocation_slack")]
    pub preallocation_slack: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            lease_term_ms: default_lease_term_ms(),
            preallocation_slack: default_preallocation_slack(),
        }
    }
}

// Default value functions

fn default_update_interval_ms() -> u64 {
    1_500
}

fn default_safety_margin_ms() -> u64 {
    3_000
}

fn default_lease_term_ms() -> u64 {
    300_000
}

fn default_preallocation_slack() -> u64 {
    128
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_clock()?;
        self.validate_lease()?;
        Ok(())
    }

    fn validate_clock(&self) -> Result<()> {
        if self.clock.update_interval_ms == 0 {
            anyhow::bail!("clock.update_interval_ms must be > 0");
        }

        // The watermark must stay ahead of the estimate for a full update
        // cycle, storage round trip included.
        if self.clock.safety_margin_ms <= self.clock.update_interval_ms {
            anyhow::bail!(
                "clock.safety_margin_ms ({}) must exceed clock.update_interval_ms ({})",
                self.clock.safety_margin_ms,
                self.clock.update_interval_ms
            );
        }

        Ok(())
    }

    fn validate_lease(&self) -> Result<()> {
        if self.lease.lease_term_ms == 0 {
            anyhow::bail!("lease.lease_term_ms must be > 0");
        }

        Ok(())
    }
}
