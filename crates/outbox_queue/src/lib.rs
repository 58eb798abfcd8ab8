//! # Outbox Queue
//!
//! The durable local store behind the offline write queue.
//!
//! Writes that cannot reach the origin server are appended here as
//! [`QueuedRecord`]s and stay until the sync coordinator has a confirmed
//! batch acknowledgment for them.
//!
//! ## Directory layout
//!
//! ```text
//! <queue_dir>/
//! ├─ LOCK        # Advisory lock, one open store per directory
//! ├─ MARK        # Key high-water mark, survives log compaction
//! └─ queue.log   # Append-only framed record log
//! ```
//!
//! ## Key Invariants
//!
//! - Keys are unique and strictly increasing, never reused (even after clear)
//! - Payloads are never mutated after insertion
//! - `read_all` returns records in insertion order
//! - `clear_snapshot` removes only what the snapshot observed
//!
//! ## Example
//!
//! ```rust
//! use outbox_queue::DurableStore;
//! use serde_json::json;
//!
//! let store = DurableStore::in_memory();
//! store.append(json!({"pizzaName": "Margherita"})).unwrap();
//!
//! let snapshot = store.read_all().unwrap();
//! assert_eq!(snapshot.len(), 1);
//!
//! store.clear_snapshot(&snapshot).unwrap();
//! assert!(store.is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod log;
mod record;
mod store;
mod types;

pub use config::StoreConfig;
pub use error::{QueueError, QueueResult};
pub use record::{LogRecord, LogRecordType, LOG_MAGIC, LOG_VERSION};
pub use store::{DurableStore, QueueStats, Snapshot};
pub use types::{QueuedRecord, RecordKey};
