//! # Change Feed
//!
//! Broadcast of committed product writes. Live subscriptions listen here and
//! re-query the owner's subcollection when one of its documents changes.
//!
//! ```text
//!  ProductRepository::create/update/delete
//!        │  (after commit)
//!        ▼
//!  ChangeFeed::publish ──► broadcast::Sender<ChangeEvent>
//!                               │
//!              ┌────────────────┼────────────────┐
//!              ▼                ▼                ▼
//!        subscription A   subscription B   subscription C
//!        (owner u-1)      (owner u-2)      (owner u-1)
//! ```

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events a lagging receiver can fall behind by.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Kind of write that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
}

/// One committed write to a product document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub namespace: String,
    pub owner_id: String,
    pub product_id: String,
    pub op: ChangeOp,
}

impl ChangeEvent {
    /// True if the event touches the given owner's subcollection.
    pub fn concerns(&self, namespace: &str, owner_id: &str) -> bool {
        self.namespace == namespace && self.owner_id == owner_id
    }
}

/// Cloneable handle to the store-wide change feed.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ChangeFeed { tx }
    }

    /// Publishes an event. Having no listeners is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(receivers, "Published change event");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new(DEFAULT_FEED_CAPACITY)
    }
}
