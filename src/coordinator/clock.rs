//! Coordinator cluster clock.
//!
//! [`ClusterClock`] controls the progression of cluster time and maintains
//! two properties:
//! 1. The clock advances monotonically over the entire life of the cluster,
//!    including across coordinator crashes.
//! 2. During normal operation the clock advances in sync with the
//!    coordinator's own elapsed time (see [`ClusterClock::get_time`] for the
//!    degraded behavior).
//!
//! The mechanism is a safety watermark kept in external storage: a cluster
//! time guaranteed to be greater than any value the clock has ever handed
//! out. The watermark is persisted ahead of real time by a fixed margin, so
//! each `get_time` call is a cheap local computation, while a coordinator
//! that crashes and restarts can resume from the watermark without ever
//! reporting a smaller time than its predecessor did.

use crate::core::config::ClockConfig;
use crate::core::error::MeridianResult;
use crate::core::time::ClusterTime;
use crate::storage::external::{decode_u64, encode_u64, keys, ExternalStorage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Clock state guarded by the component lock.
#[derive(Debug)]
struct ClockState {
    /// The last cluster time confirmed in external storage. The largest
    /// value that is safe to hand out; `ZERO` until the first watermark is
    /// persisted or recovered.
    safe_time: ClusterTime,

    /// Watermark updates applied since construction.
    updates_applied: u64,

    /// Watermark updates that failed at the storage layer.
    update_failures: u64,
}

/// State shared between the clock handle and the updater task.
#[derive(Debug)]
struct ClockShared {
    storage: Arc<dyn ExternalStorage>,
    config: ClockConfig,

    /// Local instant at construction; the base for elapsed-time estimates.
    started_at: Instant,

    /// Cluster time recovered from external storage at construction
    /// (`ZERO` when the cluster is new).
    starting_cluster_time: ClusterTime,

    state: Mutex<ClockState>,
}

impl ClockShared {
    /// Raw uncapped estimate of the current cluster time. Strictly
    /// increasing between two calls separated by positive elapsed time;
    /// never externalized without capping at the safe watermark.
    fn uncapped_now(&self) -> ClusterTime {
        self.starting_cluster_time
            .add_ms(self.started_at.elapsed().as_millis() as u64)
    }

    /// Persist a fresh watermark and, only once the write is confirmed,
    /// advance the in-memory safe time to it.
    async fn run_update_once(&self) -> MeridianResult<()> {
        let mut state = self.state.lock().await;
        let new_watermark = self.uncapped_now().add_ms(self.config.safety_margin_ms);
        match self
            .storage
            .set(keys::CLUSTER_CLOCK, encode_u64(new_watermark.ms))
            .await
        {
            Ok(()) => {
                state.safe_time = new_watermark;
                state.updates_applied += 1;
                Ok(())
            }
            Err(error) => {
                state.update_failures += 1;
                Err(error.into())
            }
        }
    }
}

/// Handle for the periodic watermark update task.
///
/// The updater is an explicit schedulable unit: start and stop act on the
/// whole task, stop blocks until the task has actually ceased running, and
/// at most one update is in flight at a time. While stopped, `get_time`
/// still computes off the last known watermark but the watermark never
/// advances.
#[derive(Debug)]
struct SafeTimeUpdater {
    shared: Arc<ClockShared>,
    task: parking_lot::Mutex<Option<UpdaterTask>>,
}

#[derive(Debug)]
struct UpdaterTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SafeTimeUpdater {
    fn new(shared: Arc<ClockShared>) -> Self {
        Self {
            shared,
            task: parking_lot::Mutex::new(None),
        }
    }

    fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let shared = self.shared.clone();
        let period = Duration::from_millis(shared.config.update_interval_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(error) = shared.run_update_once().await {
                            tracing::warn!(
                                %error,
                                "safe time update failed; retrying next interval"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        *task = Some(UpdaterTask {
            shutdown: shutdown_tx,
            handle,
        });
        tracing::debug!("safe time updater started");
    }

    async fn stop(&self) {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return;
        };

        let _ = task.shutdown.send(true);
        if let Err(error) = task.handle.await {
            tracing::warn!(%error, "safe time updater task failed");
        }
        tracing::debug!("safe time updater stopped");
    }
}

/// Snapshot of clock state for observability.
#[derive(Debug, Clone)]
pub struct ClockStats {
    /// Cluster time recovered at construction.
    pub starting_cluster_time: ClusterTime,
    /// Current safe watermark (`ZERO` means no usable time yet).
    pub safe_time: ClusterTime,
    /// Whether the periodic updater is running.
    pub updater_running: bool,
    /// Watermark updates applied since construction.
    pub updates_applied: u64,
    /// Watermark updates that failed at the storage layer.
    pub update_failures: u64,
}

/// The coordinator-side cluster clock.
///
/// Thread-safe; cheap to share behind an `Arc`. Callers obtain cluster time
/// with [`get_time`](Self::get_time); the embedding process starts the
/// periodic updater once at startup and stops it at shutdown.
#[derive(Debug)]
pub struct ClusterClock {
    shared: Arc<ClockShared>,
    updater: SafeTimeUpdater,
}

impl ClusterClock {
    /// Construct a clock, recovering the last persisted watermark.
    ///
    /// With no stored watermark (first-ever start of the cluster) the clock
    /// begins in the unusable state and reports `ZERO` until the updater
    /// persists the first watermark. With a stored watermark `W`, the clock
    /// begins at `W`, guaranteeing it never reports a value a previous
    /// incarnation could have exceeded.
    ///
    /// The updater is not started here; call
    /// [`start_updater`](Self::start_updater) once the embedding process is
    /// ready to serve.
    pub async fn recover(
        storage: Arc<dyn ExternalStorage>,
        config: ClockConfig,
    ) -> MeridianResult<Self> {
        let recovered = Self::recover_cluster_time(storage.as_ref()).await?;
        if recovered.is_zero() {
            tracing::info!("no stored cluster time; starting cold");
        } else {
            tracing::info!(recovered = %recovered, "recovered cluster time");
        }

        let shared = Arc::new(ClockShared {
            storage,
            config,
            started_at: Instant::now(),
            starting_cluster_time: recovered,
            state: Mutex::new(ClockState {
                safe_time: recovered,
                updates_applied: 0,
                update_failures: 0,
            }),
        });

        Ok(Self {
            updater: SafeTimeUpdater::new(shared.clone()),
            shared,
        })
    }

    /// Read the stored safe watermark, or `ZERO` if none was ever written.
    pub async fn recover_cluster_time(
        storage: &dyn ExternalStorage,
    ) -> MeridianResult<ClusterTime> {
        match storage.get(keys::CLUSTER_CLOCK).await? {
            None => Ok(ClusterTime::ZERO),
            Some(raw) => Ok(ClusterTime::new(decode_u64(keys::CLUSTER_CLOCK, raw)?)),
        }
    }

    /// Current cluster time.
    ///
    /// Returns `ZERO` until a safe watermark has been persisted or
    /// recovered; callers must treat that as "ordering not yet available".
    /// Otherwise returns the local elapsed-time estimate capped at the safe
    /// watermark, so no reported value can outrun what is durably recorded.
    /// If the updater stalls, readings converge to the watermark and repeat
    /// until it advances again; they never move backward.
    pub async fn get_time(&self) -> ClusterTime {
        let state = self.shared.state.lock().await;
        if state.safe_time.is_zero() {
            return ClusterTime::ZERO;
        }
        self.shared.uncapped_now().min(state.safe_time)
    }

    /// Run a single watermark update synchronously.
    ///
    /// This is the step the periodic updater runs on every interval; exposed
    /// so tests (and controlled shutdown paths) can advance the watermark
    /// deterministically without the task running.
    pub async fn run_update_once(&self) -> MeridianResult<()> {
        self.shared.run_update_once().await
    }

    /// Start the periodic watermark updater. Idempotent.
    pub fn start_updater(&self) {
        self.updater.start();
    }

    /// Stop the periodic watermark updater, blocking until the task has
    /// ceased running. Idempotent.
    pub async fn stop_updater(&self) {
        self.updater.stop().await;
    }

    /// Whether the periodic updater is running.
    pub fn updater_running(&self) -> bool {
        self.updater.is_running()
    }

    /// Snapshot clock state for observability.
    pub async fn stats(&self) -> ClockStats {
        let state = self.shared.state.lock().await;
        ClockStats {
            starting_cluster_time: self.shared.starting_cluster_time,
            safe_time: state.safe_time,
            updater_running: self.updater.is_running(),
            updates_applied: state.updates_applied,
            update_failures: state.update_failures,
        }
    }

    /// Force the safe watermark to a specific value.
    ///
    /// Bypasses external storage entirely; only for tests that need a known
    /// watermark without timing dependencies.
    pub async fn set_safe_time_for_tests(&self, safe_time: ClusterTime) {
        self.shared.state.lock().await.safe_time = safe_time;
    }
}
