//! Common test utilities.
//!
//! Shared helpers for integration tests. Import with `mod common;` in test
//! files.

use meridian::core::config::{ClockConfig, Config, LeaseConfig};
use meridian::core::time::ClusterTime;
use meridian::coordinator::clock::ClusterClock;
use meridian::storage::external::{decode_u64, ExternalStorage};
use meridian::storage::memory::MemoryStorage;
use std::sync::Arc;
use std::time::Duration;

/// Initialize test logging; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Fresh in-memory external storage.
pub fn storage() -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::new())
}

/// Coerce the concrete storage to the trait object the components take.
pub fn as_dyn(storage: &Arc<MemoryStorage>) -> Arc<dyn ExternalStorage> {
    storage.clone()
}

/// Clock configuration with fast timing for tests.
pub fn fast_clock_config() -> ClockConfig {
    ClockConfig {
        update_interval_ms: 10,
        safety_margin_ms: 40,
    }
}

/// Full configuration with fast timing and a short lease term.
pub fn fast_config() -> Config {
    Config {
        clock: fast_clock_config(),
        lease: LeaseConfig {
            lease_term_ms: 500,
            preallocation_slack: 2,
        },
    }
}

/// Recover a clock over the given storage without starting its updater.
pub async fn recovered_clock(storage: &Arc<MemoryStorage>) -> ClusterClock {
    ClusterClock::recover(as_dyn(storage), fast_clock_config())
        .await
        .expect("clock recovery failed")
}

/// A clock whose time is usable and advancing: the safe watermark is forced
/// far ahead, so readings follow local elapsed time.
pub async fn safe_clock(storage: &Arc<MemoryStorage>) -> Arc<ClusterClock> {
    let clock = recovered_clock(storage).await;
    clock
        .set_safe_time_for_tests(ClusterTime::new(10_000_000))
        .await;
    // Let a little real time pass so the first reading is nonzero.
    tokio::time::sleep(Duration::from_millis(2)).await;
    Arc::new(clock)
}

/// Decode the watermark stored under `key`, if any.
pub fn stored_watermark(storage: &Arc<MemoryStorage>, key: &str) -> Option<u64> {
    storage
        .peek(key)
        .map(|raw| decode_u64(key, raw).expect("stored watermark is corrupt"))
}
