//! Cluster clock integration tests.

mod common;

use bytes::Bytes;
use common::{as_dyn, fast_clock_config, recovered_clock, storage, stored_watermark};
use meridian::core::error::MeridianError;
use meridian::core::time::ClusterTime;
use meridian::coordinator::clock::ClusterClock;
use meridian::storage::external::{encode_u64, keys, StorageError};
use std::time::Duration;

// ============================================================================
// Cold start and the zero sentinel
// ============================================================================

#[tokio::test]
async fn cold_start_reports_zero_until_first_watermark() {
    common::init_tracing();
    let storage = storage();
    let clock = recovered_clock(&storage).await;

    assert_eq!(clock.get_time().await, ClusterTime::ZERO);

    // The sentinel persists regardless of elapsed real time; only a
    // persisted watermark makes time usable.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(clock.get_time().await, ClusterTime::ZERO);

    let stats = clock.stats().await;
    assert_eq!(stats.safe_time, ClusterTime::ZERO);
    assert_eq!(stats.updates_applied, 0);
}

#[tokio::test]
async fn recovery_miss_reads_the_clock_key() {
    let storage = storage();
    let recovered = ClusterClock::recover_cluster_time(storage.as_ref())
        .await
        .unwrap();
    assert_eq!(recovered, ClusterTime::ZERO);
    assert_eq!(storage.take_log(), vec!["get(coordinatorClusterClock)"]);
}

// ============================================================================
// Time reads in the safe state
// ============================================================================

#[tokio::test]
async fn time_is_nonzero_and_capped_by_the_watermark() {
    let storage = storage();
    let clock = recovered_clock(&storage).await;

    // Watermark large enough that readings follow local elapsed time.
    clock.set_safe_time_for_tests(ClusterTime::new(10_000)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let first = clock.get_time().await;
    assert!(first > ClusterTime::ZERO);
    assert!(first.ms < 10_000);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = clock.get_time().await;
    assert!(second > first);
    assert!(second.ms < 10_000);
}

#[tokio::test]
async fn stalled_watermark_pins_readings_without_regression() {
    let storage = storage();
    let clock = recovered_clock(&storage).await;

    // A watermark the local estimate has already raced past.
    clock.set_safe_time_for_tests(ClusterTime::new(1)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Degraded mode: readings converge to the watermark and repeat.
    assert_eq!(clock.get_time().await, ClusterTime::new(1));
    assert_eq!(clock.get_time().await, ClusterTime::new(1));
}

// ============================================================================
// Watermark updates
// ============================================================================

#[tokio::test]
async fn single_update_persists_watermark_ahead_of_time() {
    let storage = storage();
    let clock = recovered_clock(&storage).await;
    storage.take_log();

    clock.run_update_once().await.unwrap();
    assert_eq!(storage.take_log(), vec!["set(coordinatorClusterClock)"]);

    // The persisted watermark leads the estimate by the safety margin.
    let stored = stored_watermark(&storage, keys::CLUSTER_CLOCK).unwrap();
    assert!(stored >= fast_clock_config().safety_margin_ms);

    let stats = clock.stats().await;
    assert_eq!(stats.safe_time.ms, stored);
    assert_eq!(stats.updates_applied, 1);

    // Time becomes usable once the first watermark is confirmed.
    tokio::time::sleep(Duration::from_millis(2)).await;
    let time = clock.get_time().await;
    assert!(time > ClusterTime::ZERO);
    assert!(time.ms <= stored);
}

#[tokio::test]
async fn failed_update_leaves_the_clock_unusable() {
    let storage = storage();
    let clock = recovered_clock(&storage).await;

    storage.fail_next_sets(1);
    let err = clock.run_update_once().await.unwrap_err();
    assert!(err.is_retriable());
    assert!(matches!(
        err,
        MeridianError::Storage(StorageError::Unavailable { .. })
    ));

    // Nothing advanced: no watermark, no usable time.
    assert_eq!(clock.get_time().await, ClusterTime::ZERO);
    let stats = clock.stats().await;
    assert_eq!(stats.safe_time, ClusterTime::ZERO);
    assert_eq!(stats.update_failures, 1);

    // The next update succeeds and the clock becomes usable.
    clock.run_update_once().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(clock.get_time().await > ClusterTime::ZERO);
}

#[tokio::test]
async fn periodic_updater_advances_and_stop_ceases_writes() {
    common::init_tracing();
    let storage = storage();
    let clock = recovered_clock(&storage).await;

    clock.start_updater();
    assert!(clock.updater_running());

    // Wait for at least two applied updates.
    let mut applied = 0;
    for _ in 0..400 {
        applied = clock.stats().await.updates_applied;
        if applied >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(applied >= 2, "updater applied {} updates", applied);

    let before_stop = clock.stats().await.safe_time;
    assert!(before_stop > ClusterTime::ZERO);

    clock.stop_updater().await;
    assert!(!clock.updater_running());

    // Stop blocked until the task ceased: no further storage writes.
    storage.take_log();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(storage.take_log().is_empty());
}

// ============================================================================
// Recovery across incarnations
// ============================================================================

#[tokio::test]
async fn restart_resumes_from_the_persisted_watermark() {
    let storage = storage();

    let first = recovered_clock(&storage).await;
    first.run_update_once().await.unwrap();
    let watermark = stored_watermark(&storage, keys::CLUSTER_CLOCK).unwrap();
    drop(first);

    // A fresh incarnation starts at the watermark: its first reading is
    // nonzero and can never fall below anything the previous incarnation
    // reported.
    let second = recovered_clock(&storage).await;
    let stats = second.stats().await;
    assert_eq!(stats.starting_cluster_time.ms, watermark);
    assert_eq!(stats.safe_time.ms, watermark);
    assert_eq!(second.get_time().await.ms, watermark);
}

#[tokio::test]
async fn watermark_round_trips_exactly() {
    let storage = storage();
    storage.seed(keys::CLUSTER_CLOCK, encode_u64(123_456));

    let recovered = ClusterClock::recover_cluster_time(storage.as_ref())
        .await
        .unwrap();
    assert_eq!(recovered, ClusterTime::new(123_456));
}

#[tokio::test]
async fn corrupt_watermark_is_rejected() {
    let storage = storage();
    storage.seed(keys::CLUSTER_CLOCK, Bytes::from_static(&[1, 2, 3]));

    let err = ClusterClock::recover(as_dyn(&storage), fast_clock_config())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MeridianError::Storage(StorageError::Corrupt { found: 3, .. })
    ));
}
