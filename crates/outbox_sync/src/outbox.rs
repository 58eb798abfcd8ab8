//! The outbox facade: one store shared by the interceptor and coordinator.

use crate::config::SyncConfig;
use crate::connectivity::ConnectivitySignal;
use crate::coordinator::{SyncCoordinator, SyncOutcome, SyncReport};
use crate::error::SyncResult;
use crate::http::HttpOrigin;
use crate::interceptor::{Submission, WriteInterceptor};
use crate::origin::Origin;
use outbox_queue::{DurableStore, StoreConfig};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// Offline-capable writer for the origin's create endpoint.
///
/// The store is opened once and handed to both halves: writes that cannot
/// reach the origin are queued by the interceptor, and the coordinator
/// replays them when connectivity returns.
pub struct Outbox<O: Origin + 'static = HttpOrigin> {
    store: Arc<DurableStore>,
    interceptor: WriteInterceptor<O>,
    coordinator: Arc<SyncCoordinator<O>>,
    config: SyncConfig,
}

impl Outbox<HttpOrigin> {
    /// Opens (creating if needed) the queue at `dir` and talks HTTP to the
    /// configured origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, or the queue cannot
    /// be opened (including when another process holds it).
    pub fn open(dir: &Path, config: SyncConfig) -> SyncResult<Self> {
        Self::open_with_store_config(dir, config, StoreConfig::default())
    }

    /// Like [`Outbox::open`], with explicit store settings.
    pub fn open_with_store_config(
        dir: &Path,
        config: SyncConfig,
        store_config: StoreConfig,
    ) -> SyncResult<Self> {
        let origin = HttpOrigin::new(&config)?;
        let store = DurableStore::open_with_config(dir, store_config)?;
        info!(origin = %origin.url(), "outbox ready");
        Ok(Self::with_parts(Arc::new(store), Arc::new(origin), config))
    }
}

impl<O: Origin + 'static> Outbox<O> {
    /// Wires an already-open store and an origin together.
    pub fn with_parts(store: Arc<DurableStore>, origin: Arc<O>, config: SyncConfig) -> Self {
        let interceptor = WriteInterceptor::new(
            Arc::clone(&origin),
            Arc::clone(&store),
            config.attempt_timeout,
        );
        let coordinator = Arc::new(SyncCoordinator::new(
            Arc::clone(&store),
            origin,
            config.clone(),
        ));
        Self {
            store,
            interceptor,
            coordinator,
            config,
        }
    }

    /// Submits one write; see [`WriteInterceptor::submit`].
    pub async fn submit(&self, payload: Value) -> SyncResult<Submission> {
        self.interceptor.submit(payload).await
    }

    /// Runs one sync cycle; see [`SyncCoordinator::drain_and_sync`].
    pub async fn drain_and_sync(&self) -> SyncResult<SyncOutcome> {
        self.coordinator.drain_and_sync().await
    }

    /// Starts the background sync loop driven by `signal`.
    ///
    /// The configured settle window is applied to the signal's edges. The
    /// loop ends once every handle to `signal` has been dropped.
    pub fn start(&self, signal: &ConnectivitySignal) -> JoinHandle<()> {
        let monitor = signal
            .monitor()
            .with_settle_window(self.config.settle_window);
        self.coordinator.spawn(monitor)
    }

    /// Subscribes to completed-sync announcements.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncReport> {
        self.coordinator.subscribe()
    }

    /// The shared queue.
    pub fn store(&self) -> &Arc<DurableStore> {
        &self.store
    }

    /// The write interceptor.
    pub fn interceptor(&self) -> &WriteInterceptor<O> {
        &self.interceptor
    }

    /// The sync coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator<O>> {
        &self.coordinator
    }

    /// The sync configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
