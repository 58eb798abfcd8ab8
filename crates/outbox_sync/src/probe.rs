//! Reachability probe feeding the connectivity signal.
//!
//! Outside a browser there is no platform "online" event, so the probe opens
//! a TCP connection to the origin host at a fixed interval and reports what
//! it finds. It only observes; retries of queued writes are the
//! coordinator's business.

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivitySignal, NetworkStatus};
use crate::error::{SyncError, SyncResult};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, trace};

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Periodically checks whether the origin host accepts connections.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    target: String,
    interval: Duration,
    connect_timeout: Duration,
    signal: ConnectivitySignal,
}

impl ReachabilityProbe {
    /// Creates a probe for the configured origin.
    pub fn new(config: &SyncConfig, signal: ConnectivitySignal) -> SyncResult<Self> {
        let url = config.validate()?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::InvalidConfig("origin url has no host".into()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidConfig("origin url has no port".into()))?;

        Ok(Self {
            target: format!("{host}:{port}"),
            interval: config.probe_interval,
            connect_timeout: config.request_timeout.min(MAX_CONNECT_TIMEOUT),
            signal,
        })
    }

    /// Returns the `host:port` being probed.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Probes once and reports the result. Returns the observed status.
    pub async fn check(&self) -> NetworkStatus {
        let status = match timeout(self.connect_timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_)) => NetworkStatus::Online,
            Ok(Err(e)) => {
                trace!(addr = %self.target, error = %e, "probe connect failed");
                NetworkStatus::Offline
            }
            Err(_) => NetworkStatus::Offline,
        };
        self.signal.report(status);
        status
    }

    /// Probes forever at the configured interval.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            debug!(addr = %self.target, every = ?self.interval, "reachability probe started");
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.check().await;
            }
        })
    }
}
