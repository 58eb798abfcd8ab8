//! CLI command implementations.

pub mod clear;
pub mod inspect;
pub mod list;
pub mod submit;
pub mod sync;
pub mod watch;

use outbox_queue::{DurableStore, StoreConfig};
use std::path::Path;

/// Opens an existing queue directory without creating it.
pub(crate) fn open_existing(dir: &Path) -> Result<DurableStore, Box<dyn std::error::Error>> {
    if !dir.exists() {
        return Err(format!("No outbox found at {}", dir.display()).into());
    }
    let config = StoreConfig::new().create_if_missing(false);
    Ok(DurableStore::open_with_config(dir, config)?)
}
