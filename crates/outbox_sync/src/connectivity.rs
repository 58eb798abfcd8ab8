//! Connectivity signal and edge-triggered online notifications.
//!
//! The platform side feeds observations into a [`ConnectivitySignal`].
//! Consumers hold a [`ConnectivityMonitor`] and get one notification per
//! offline→online edge, never one per repeated "online" observation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Network status as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// The origin is believed reachable.
    Online,
    /// The origin is believed unreachable.
    Offline,
    /// Nothing is known yet.
    Unknown,
}

impl NetworkStatus {
    /// Returns true unless the status is known to be offline.
    ///
    /// `Unknown` counts as online: the next sync attempt finds out for real.
    pub fn is_online(self) -> bool {
        !matches!(self, NetworkStatus::Offline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observed {
    status: NetworkStatus,
    /// Bumped on every transition into `Offline`, so an offline dip that a
    /// busy consumer never saw still registers as an edge.
    offline_epoch: u64,
}

/// Publisher side of the connectivity state.
///
/// Cloning yields another handle to the same state.
#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    tx: Arc<watch::Sender<Observed>>,
}

impl ConnectivitySignal {
    /// Creates a signal in the `Unknown` state.
    pub fn new() -> Self {
        Self::with_status(NetworkStatus::Unknown)
    }

    /// Creates a signal with a known initial status.
    pub fn with_status(status: NetworkStatus) -> Self {
        let (tx, _rx) = watch::channel(Observed {
            status,
            offline_epoch: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Records an observation. Returns true if the status changed.
    ///
    /// Repeating the current status is a no-op and wakes nobody.
    pub fn report(&self, status: NetworkStatus) -> bool {
        let changed = self.tx.send_if_modified(|observed| {
            if observed.status == status {
                return false;
            }
            if status == NetworkStatus::Offline {
                observed.offline_epoch += 1;
            }
            observed.status = status;
            true
        });
        if changed {
            debug!(?status, "connectivity changed");
        }
        changed
    }

    /// Reports `Online`.
    pub fn set_online(&self) -> bool {
        self.report(NetworkStatus::Online)
    }

    /// Reports `Offline`.
    pub fn set_offline(&self) -> bool {
        self.report(NetworkStatus::Offline)
    }

    /// Returns the current status.
    pub fn current(&self) -> NetworkStatus {
        self.tx.borrow().status
    }

    /// Creates a monitor observing this signal.
    pub fn monitor(&self) -> ConnectivityMonitor {
        ConnectivityMonitor {
            rx: self.tx.subscribe(),
            settle_window: Duration::ZERO,
        }
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side of the connectivity state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    rx: watch::Receiver<Observed>,
    settle_window: Duration,
}

impl ConnectivityMonitor {
    /// Requires an online edge to hold for `window` before it fires.
    ///
    /// Flapping inside the window collapses into a single notification.
    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    /// Reads the live status.
    pub fn current(&self) -> NetworkStatus {
        self.rx.borrow().status
    }

    /// Returns the stream of online edges.
    pub fn edges(self) -> OnlineEdges {
        let observed = *self.rx.borrow();
        OnlineEdges {
            rx: self.rx,
            settle_window: self.settle_window,
            was_online: observed.status.is_online(),
            seen_epoch: observed.offline_epoch,
        }
    }

    /// Runs `handler` once per offline→online edge.
    ///
    /// Handlers run one at a time; the task ends when the signal is dropped.
    pub fn on_became_online<F, Fut>(self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut edges = self.edges();
        tokio::spawn(async move {
            while edges.next().await.is_some() {
                handler().await;
            }
            debug!("connectivity signal closed");
        })
    }
}

/// Edge-triggered stream of "became online" events.
#[derive(Debug)]
pub struct OnlineEdges {
    rx: watch::Receiver<Observed>,
    settle_window: Duration,
    was_online: bool,
    seen_epoch: u64,
}

impl OnlineEdges {
    /// Waits for the next offline→online edge.
    ///
    /// Returns `None` once the signal has been dropped.
    pub async fn next(&mut self) -> Option<()> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }

            let observed = *self.rx.borrow_and_update();
            if !observed.status.is_online() {
                self.was_online = false;
                continue;
            }
            if self.was_online && observed.offline_epoch == self.seen_epoch {
                continue;
            }

            if !self.settle_window.is_zero() {
                tokio::time::sleep(self.settle_window).await;
                let settled = *self.rx.borrow_and_update();
                if !settled.status.is_online() {
                    debug!("online edge did not settle");
                    self.was_online = false;
                    continue;
                }
                self.seen_epoch = settled.offline_epoch;
            } else {
                self.seen_epoch = observed.offline_epoch;
            }

            self.was_online = true;
            info!("connectivity regained");
            return Some(());
        }
    }
}
