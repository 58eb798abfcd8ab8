//! Queue record types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Local key assigned to a queued record at insertion time.
///
/// Keys are strictly increasing within a store and never reused, even after
/// the store is cleared or reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub u64);

impl RecordKey {
    /// The first key handed out by a fresh store.
    pub const FIRST: Self = Self(1);

    /// Creates a record key.
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the key after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A write waiting to be replayed against the origin server.
///
/// `payload` is exactly the body the origin create endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRecord {
    /// Local key.
    pub key: RecordKey,
    /// Opaque request body.
    pub payload: Value,
}
