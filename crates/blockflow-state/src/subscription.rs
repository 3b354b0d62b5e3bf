//! Store change notifications.

use blockflow_core::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the change channel; slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 256;

/// What changed in a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    /// A list fetch completed.
    Loaded { count: usize },
    /// A list fetch failed; the previous value is kept.
    LoadFailed { message: String, status: Option<u16> },
    /// The list was marked stale.
    Invalidated,
    /// A create call succeeded.
    Created { id: String },
    /// A single item was re-fetched.
    Refreshed { id: String },
}

/// A change event published by the collection store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    /// The collection that changed.
    pub kind: ResourceKind,

    /// Type of change.
    pub change: Change,

    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
}

impl StoreEvent {
    pub fn new(kind: ResourceKind, change: Change) -> Self {
        Self {
            kind,
            change,
            timestamp: Utc::now(),
        }
    }
}

/// Fan-out of store events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, kind: ResourceKind, change: Change) {
        let _ = self.sender.send(StoreEvent::new(kind, change));
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
