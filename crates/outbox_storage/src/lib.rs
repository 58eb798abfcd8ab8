//! # Outbox Storage
//!
//! Byte-store backends underneath the offline write queue.
//!
//! Backends are **opaque byte stores**: they append, read back, flush and
//! truncate bytes, and know nothing about queue records. The queue crate
//! owns the record framing.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral queues
//! - [`FileBackend`] - For persistent queues that survive restarts
//!
//! Both backends accept an optional byte quota. An append that would exceed
//! it fails with [`StorageError::Full`] and writes nothing.
//!
//! ## Example
//!
//! ```rust
//! use outbox_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"{\"pizzaName\":\"A\"}").unwrap();
//! let data = backend.read_at(offset, 17).unwrap();
//! assert_eq!(&data, b"{\"pizzaName\":\"A\"}");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
