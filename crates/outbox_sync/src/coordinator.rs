//! Sync coordinator: drains the queue and replays it against the origin.

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::origin::{Origin, OriginResponse, ServerRecord};
use outbox_queue::DurableStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

const REPORT_CAPACITY: usize = 16;

/// The current state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing has run yet.
    Idle,
    /// Taking a snapshot of the queue.
    Draining,
    /// Waiting for the origin to answer the batch.
    Submitting,
    /// Removing the accepted snapshot from the queue.
    Clearing,
    /// The last cycle finished without error.
    Synced,
    /// The last cycle failed; the queue is untouched.
    Error,
}

impl SyncState {
    /// Returns true while a cycle is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Draining | SyncState::Submitting | SyncState::Clearing
        )
    }
}

/// Statistics about sync cycles.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Cycles that ended with the queue drained (including empty ones).
    pub cycles_completed: u64,
    /// Records accepted by the origin in total.
    pub records_submitted: u64,
    /// Cycles that ended in a transport or business failure.
    pub failures: u64,
    /// When the last successful cycle finished.
    pub last_sync_time: Option<Instant>,
    /// Last failure message.
    pub last_error: Option<String>,
}

/// Why a cycle left the queue untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    /// The origin could not be reached.
    Transport(String),
    /// The origin rejected the batch.
    Business(String),
    /// The origin did not answer within the attempt timeout.
    TimedOut(Duration),
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncFailure::Transport(message) => write!(f, "origin unreachable: {message}"),
            SyncFailure::Business(message) => write!(f, "origin rejected batch: {message}"),
            SyncFailure::TimedOut(after) => write!(f, "no response within {after:?}"),
        }
    }
}

/// Result of one `drain_and_sync` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The queue was empty; no request was made.
    Empty,
    /// The batch was accepted and cleared from the queue.
    Synced {
        /// Number of queued records submitted.
        submitted: usize,
        /// Records as created by the origin.
        records: Vec<ServerRecord>,
    },
    /// The batch was not accepted; every queued record is still there.
    Failed {
        /// What went wrong.
        reason: SyncFailure,
        /// Records still waiting in the queue.
        pending: usize,
    },
    /// Another cycle was in flight; nothing was done.
    AlreadyRunning,
}

/// Announcement of a completed sync, for user-visible confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Number of queued records the origin accepted.
    pub submitted: usize,
    /// Records as created by the origin.
    pub records: Vec<ServerRecord>,
    /// When the queue was cleared.
    pub completed_at: SystemTime,
}

/// Drains the queue and submits it to the origin as one batch.
///
/// This is the only component that clears the queue, and it only removes
/// the keys of the snapshot the origin accepted.
pub struct SyncCoordinator<O: Origin> {
    store: Arc<DurableStore>,
    origin: Arc<O>,
    config: SyncConfig,
    in_flight: AtomicBool,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    reports: broadcast::Sender<SyncReport>,
}

impl<O: Origin + 'static> SyncCoordinator<O> {
    /// Creates a coordinator over a shared store and origin.
    pub fn new(store: Arc<DurableStore>, origin: Arc<O>, config: SyncConfig) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            store,
            origin,
            config,
            in_flight: AtomicBool::new(false),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            reports,
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true while a cycle is in flight.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Subscribes to completed-sync announcements.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncReport> {
        self.reports.subscribe()
    }

    /// Runs one sync cycle.
    ///
    /// Takes a snapshot of the queue, submits its payloads in one request,
    /// and clears exactly that snapshot if the origin accepted all of it.
    /// Any failure leaves the queue untouched and is reported through
    /// [`SyncOutcome::Failed`]; the next trigger retries the same records.
    ///
    /// A call made while another cycle is in flight returns
    /// [`SyncOutcome::AlreadyRunning`] without touching the queue.
    ///
    /// # Errors
    ///
    /// Only local store failures are returned as errors.
    pub async fn drain_and_sync(&self) -> SyncResult<SyncOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("sync already in flight");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        self.set_state(SyncState::Draining);
        let snapshot = match self.store.read_all() {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.store_failed(e.into())),
        };

        if snapshot.is_empty() {
            debug!("queue empty, nothing to sync");
            self.set_state(SyncState::Synced);
            self.stats.write().cycles_completed += 1;
            return Ok(SyncOutcome::Empty);
        }

        let payloads = snapshot.payloads();
        let submitted = payloads.len();
        info!(records = submitted, "submitting queued writes");

        self.set_state(SyncState::Submitting);
        let attempt = self.config.attempt_timeout;
        let failure = match timeout(attempt, self.origin.create_batch(&payloads)).await {
            Ok(OriginResponse::Success(records)) => {
                self.set_state(SyncState::Clearing);
                let removed = match self.store.clear_snapshot(&snapshot) {
                    Ok(removed) => removed,
                    Err(e) => return Err(self.store_failed(e.into())),
                };
                debug!(removed, "cleared synced snapshot");

                self.set_state(SyncState::Synced);
                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.records_submitted += submitted as u64;
                    stats.last_sync_time = Some(Instant::now());
                }
                info!(records = submitted, "all queued writes submitted");

                // Nobody listening is fine.
                let _ = self.reports.send(SyncReport {
                    submitted,
                    records: records.clone(),
                    completed_at: SystemTime::now(),
                });
                return Ok(SyncOutcome::Synced { submitted, records });
            }
            Ok(OriginResponse::BusinessFailure(message)) => SyncFailure::Business(message),
            Ok(OriginResponse::TransportFailure(message)) => SyncFailure::Transport(message),
            Err(_) => SyncFailure::TimedOut(attempt),
        };

        warn!(error = %failure, pending = submitted, "sync failed, queue left intact");
        self.set_state(SyncState::Error);
        {
            let mut stats = self.stats.write();
            stats.failures += 1;
            stats.last_error = Some(failure.to_string());
        }

        Ok(SyncOutcome::Failed {
            reason: failure,
            pending: self.store.len(),
        })
    }

    /// Drains on every online edge until the monitor's signal is dropped.
    ///
    /// If `sync_on_start` is set and the current status is online, drains
    /// once before waiting for the first edge, so writes queued by an
    /// earlier run go out as soon as possible.
    pub async fn run(&self, monitor: ConnectivityMonitor) {
        let online_at_start = monitor.current().is_online();
        // Subscribe before the startup drain so an edge during it is kept.
        let mut edges = monitor.edges();

        if self.config.sync_on_start && online_at_start {
            self.sync_logged().await;
        }

        while edges.next().await.is_some() {
            self.sync_logged().await;
        }
        debug!("connectivity monitor closed, sync loop stopping");
    }

    /// Spawns [`SyncCoordinator::run`] on the current runtime.
    pub fn spawn(self: &Arc<Self>, monitor: ConnectivityMonitor) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.run(monitor).await })
    }

    async fn sync_logged(&self) {
        if let Err(e) = self.drain_and_sync().await {
            error!(error = %e, "local store failed during sync");
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn store_failed(&self, e: SyncError) -> SyncError {
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(e.to_string());
        e
    }
}

/// Clears the in-flight flag on drop, including when the cycle's future is
/// cancelled mid-flight.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
