//! Configuration for the sync layer.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Default origin create endpoint.
pub const DEFAULT_ENDPOINT: &str = "/api/pizzas";

/// Configuration for talking to the origin server.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Origin base URL (e.g. "http://localhost:3001").
    pub origin_url: String,
    /// Path of the create endpoint.
    pub endpoint: String,
    /// HTTP client timeout for one request.
    pub request_timeout: Duration,
    /// Upper bound on one submit or sync attempt, on top of the HTTP timeout.
    pub attempt_timeout: Duration,
    /// How long an online edge must hold before it counts.
    pub settle_window: Duration,
    /// How often the reachability probe checks the origin.
    pub probe_interval: Duration,
    /// Whether to drain once at startup when online.
    pub sync_on_start: bool,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(origin_url: impl Into<String>) -> Self {
        Self {
            origin_url: origin_url.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(15),
            settle_window: Duration::from_millis(500),
            probe_interval: Duration::from_secs(5),
            sync_on_start: true,
        }
    }

    /// Sets the create endpoint path.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the HTTP request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sets the settle window for online edges.
    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    /// Sets the reachability probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Sets whether to drain at startup.
    pub fn with_sync_on_start(mut self, enabled: bool) -> Self {
        self.sync_on_start = enabled;
        self
    }

    /// Returns the full create endpoint URL.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.origin_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }

    /// Checks that the origin URL parses and has a host.
    pub fn validate(&self) -> SyncResult<reqwest::Url> {
        let url = reqwest::Url::parse(&self.endpoint_url())
            .map_err(|e| SyncError::InvalidConfig(format!("origin url: {e}")))?;
        if url.host_str().is_none() {
            return Err(SyncError::InvalidConfig(format!(
                "origin url has no host: {}",
                self.origin_url
            )));
        }
        if self.attempt_timeout.is_zero() {
            return Err(SyncError::InvalidConfig("attempt timeout must be non-zero".into()));
        }
        Ok(url)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://localhost:3001")
    }
}
