//! # Outbox Sync
//!
//! Offline write interception and sync coordination for the pizza outbox.
//!
//! This crate provides:
//! - A tagged origin response (success, business failure, transport failure)
//! - An HTTP origin client for the create endpoint
//! - Edge-triggered connectivity notifications with an optional settle window
//! - A write interceptor that queues writes the origin cannot receive
//! - A sync coordinator that replays the queue as one batch
//!
//! ## Flow
//!
//! 1. `submit` tries the origin once; on a transport failure the payload is
//!    appended to the durable queue
//! 2. When connectivity returns, the coordinator snapshots the queue and
//!    posts the snapshot as one batch
//! 3. Only if the origin accepts the whole batch is the snapshot cleared
//!
//! ## Key Invariants
//!
//! - Business failures are never queued
//! - At most one sync cycle is in flight
//! - A clear removes only the records the submitted snapshot contained
//! - A failed or timed-out cycle leaves the queue untouched
//!
//! Duplicates are possible: if the origin commits a batch but the response
//! is lost, the same records are submitted again on the next cycle. There is
//! no idempotency key in the origin contract to prevent this.
//!
//! ## Example
//!
//! ```rust,no_run
//! use outbox_sync::{ConnectivitySignal, Outbox, PizzaPayload, Submission, SyncConfig};
//! use std::path::Path;
//!
//! # async fn demo() -> outbox_sync::SyncResult<()> {
//! let outbox = Outbox::open(Path::new("./outbox"), SyncConfig::new("http://localhost:3001"))?;
//! let signal = ConnectivitySignal::new();
//! let _sync = outbox.start(&signal);
//!
//! let pizza = PizzaPayload::new("Margherita", "Lernantino").with_topping("basil");
//! match outbox.submit(pizza.to_value()).await? {
//!     Submission::Created(record) => println!("created {}", record["_id"]),
//!     Submission::Queued(key) => println!("queued as {key}"),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod coordinator;
mod error;
mod http;
mod interceptor;
mod origin;
mod outbox;
mod payload;
mod probe;

pub use config::{SyncConfig, DEFAULT_ENDPOINT};
pub use connectivity::{ConnectivityMonitor, ConnectivitySignal, NetworkStatus, OnlineEdges};
pub use coordinator::{SyncCoordinator, SyncFailure, SyncOutcome, SyncReport, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::HttpOrigin;
pub use interceptor::{Submission, WriteInterceptor};
pub use origin::{MockOrigin, Origin, OriginResponse, ServerRecord};
pub use outbox::Outbox;
pub use payload::PizzaPayload;
pub use probe::ReachabilityProbe;
