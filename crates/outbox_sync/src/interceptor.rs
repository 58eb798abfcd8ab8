//! Write interceptor: immediate write with fallback to the local queue.

use crate::error::{SyncError, SyncResult};
use crate::origin::{Origin, OriginResponse, ServerRecord};
use outbox_queue::{DurableStore, QueueError, RecordKey};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// What happened to a submitted write.
///
/// Both variants mean the write was accepted; only `Created` means the
/// origin has confirmed it.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// The origin created the record.
    Created(ServerRecord),
    /// The origin was unreachable; the payload waits in the queue.
    Queued(RecordKey),
}

impl Submission {
    /// Returns true if the payload was queued for later.
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued(_))
    }
}

/// Wraps the "create" call so a transport failure buffers the payload
/// instead of failing the caller.
///
/// Each `submit` performs exactly one of: a successful network write, or a
/// local append. It never retries; queued payloads are replayed by the
/// sync coordinator.
pub struct WriteInterceptor<O: Origin> {
    origin: Arc<O>,
    store: Arc<DurableStore>,
    attempt_timeout: Duration,
}

impl<O: Origin> WriteInterceptor<O> {
    /// Creates an interceptor sharing `store` and `origin`.
    pub fn new(origin: Arc<O>, store: Arc<DurableStore>, attempt_timeout: Duration) -> Self {
        Self {
            origin,
            store,
            attempt_timeout,
        }
    }

    /// Submits `payload` to the origin, queueing it if the origin is
    /// unreachable.
    ///
    /// # Errors
    ///
    /// - `Business` if the origin rejected the payload (it is not queued,
    ///   since the origin would reject it again on every replay)
    /// - `Store` if the payload is not a JSON object, or if the fallback
    ///   append failed and the write is lost
    pub async fn submit(&self, payload: Value) -> SyncResult<Submission> {
        if !payload.is_object() {
            return Err(SyncError::Store(QueueError::InvalidPayload(
                "payload must be a JSON object".into(),
            )));
        }

        let response = match timeout(self.attempt_timeout, self.origin.create(&payload)).await {
            Ok(response) => response,
            Err(_) => OriginResponse::TransportFailure(format!(
                "no response within {:?}",
                self.attempt_timeout
            )),
        };

        match response {
            OriginResponse::Success(mut records) => {
                // The origin echoes the created record; fall back to the payload
                // if the body was an empty array.
                let record = if records.is_empty() {
                    payload
                } else {
                    records.swap_remove(0)
                };
                info!("write accepted by origin");
                Ok(Submission::Created(record))
            }
            OriginResponse::BusinessFailure(message) => {
                warn!(%message, "origin rejected write");
                Err(SyncError::Business(message))
            }
            OriginResponse::TransportFailure(reason) => {
                let key = self.store.append(payload)?;
                info!(key = key.as_u64(), %reason, "origin unreachable, write queued");
                Ok(Submission::Queued(key))
            }
        }
    }
}

impl<O: Origin> Clone for WriteInterceptor<O> {
    fn clone(&self) -> Self {
        Self {
            origin: Arc::clone(&self.origin),
            store: Arc::clone(&self.store),
            attempt_timeout: self.attempt_timeout,
        }
    }
}
