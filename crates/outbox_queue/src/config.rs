//! Queue store configuration.

/// Configuration for opening a [`crate::DurableStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the queue directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Upper bound on the queue log size in bytes (`None` = device limit).
    pub max_log_size: Option<u64>,

    /// Whether to fsync the log after every write (safer but slower).
    pub sync_on_write: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_log_size: None,
            sync_on_write: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the queue directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Caps the queue log at `bytes`.
    #[must_use]
    pub const fn max_log_size(mut self, bytes: u64) -> Self {
        self.max_log_size = Some(bytes);
        self
    }

    /// Sets whether to fsync after every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_write);
        assert_eq!(config.max_log_size, None);
    }

    #[test]
    fn builder() {
        let config = StoreConfig::new()
            .create_if_missing(false)
            .max_log_size(4096)
            .sync_on_write(false);
        assert!(!config.create_if_missing);
        assert_eq!(config.max_log_size, Some(4096));
        assert!(!config.sync_on_write);
    }
}
