//! Identity types for brokers, listeners and published events

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Identifies one broker instance
///
/// A new broker is created on every schema compile, so the id doubles as a
/// way to tell compile generations apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrokerId(pub Uuid);

impl BrokerId {
    /// Create a new unique broker id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BrokerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broker:{}", &self.0.to_string()[..8])
    }
}

/// Listener identifier
///
/// Returned with every subscription, used to remove the listener from all of
/// its topics when it is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

static LISTENER_COUNTER: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    /// Create a new unique listener id
    pub fn new() -> Self {
        Self(LISTENER_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener:{}", self.0)
    }
}

/// An event as delivered to a listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Tag the event was published under
    pub tag: String,
    pub payload: serde_json::Value,
}
