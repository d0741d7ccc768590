//! # Live Subscriptions
//!
//! A subscription mirrors one owner's product subcollection into a callback.
//! It delivers the full sorted set once when opened and again after every
//! committed write to that subcollection.
//!
//! ```text
//!  subscribe(owner) ──► spawn task
//!                         │
//!                         ├── fetch + sort ──► on_snapshot(Vec<Product>)
//!                         │
//!                         └── loop on ChangeFeed
//!                               ├── event for owner  ──► fetch + sort ──► on_snapshot
//!                               ├── event for others ──► ignore
//!                               ├── lagged           ──► fetch + sort ──► on_snapshot
//!                               ├── fetch failed     ──► on_error, task ends
//!                               └── feed closed      ──► task ends
//! ```
//!
//! The returned [`Subscription`] is the only way to stop the task. Dropping
//! it or calling [`Subscription::unsubscribe`] detaches the query; both are
//! idempotent.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use shelf_core::Product;

use crate::error::DbError;
use crate::feed::ChangeEvent;
use crate::repository::product::SnapshotSource;

/// Guard for a live product query.
#[derive(Debug)]
pub struct Subscription {
    owner_id: String,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// A subscription that never delivers anything (already failed).
    pub(crate) fn inert(owner_id: impl Into<String>) -> Self {
        Subscription {
            owner_id: owner_id.into(),
            handle: None,
        }
    }

    /// Opens the live query. Must be called from within a Tokio runtime.
    pub(crate) fn open<S, E>(
        source: SnapshotSource,
        events: broadcast::Receiver<ChangeEvent>,
        on_snapshot: S,
        on_error: E,
    ) -> Self
    where
        S: FnMut(Vec<Product>) + Send + 'static,
        E: FnMut(DbError) + Send + 'static,
    {
        let owner_id = source.owner_id().to_string();
        let handle = tokio::spawn(run(source, events, on_snapshot, on_error));

        Subscription {
            owner_id,
            handle: Some(handle),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// True while the background query is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Detaches the query.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(owner_id = %self.owner_id, "Subscription detached");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn run<S, E>(
    source: SnapshotSource,
    mut events: broadcast::Receiver<ChangeEvent>,
    mut on_snapshot: S,
    mut on_error: E,
) where
    S: FnMut(Vec<Product>) + Send + 'static,
    E: FnMut(DbError) + Send + 'static,
{
    debug!(owner_id = %source.owner_id(), "Subscription opened");

    if !deliver(&source, &mut on_snapshot, &mut on_error).await {
        return;
    }

    loop {
        match events.recv().await {
            Ok(event) if event.concerns(source.namespace(), source.owner_id()) => {
                if !deliver(&source, &mut on_snapshot, &mut on_error).await {
                    return;
                }
            }
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    owner_id = %source.owner_id(),
                    skipped,
                    "Subscription lagged; re-fetching"
                );
                if !deliver(&source, &mut on_snapshot, &mut on_error).await {
                    return;
                }
            }
            Err(RecvError::Closed) => {
                debug!(owner_id = %source.owner_id(), "Change feed closed");
                return;
            }
        }
    }
}

/// Fetches and hands over one snapshot. Returns false if the stream ended.
async fn deliver<S, E>(source: &SnapshotSource, on_snapshot: &mut S, on_error: &mut E) -> bool
where
    S: FnMut(Vec<Product>),
    E: FnMut(DbError),
{
    match source.fetch().await {
        Ok(products) => {
            debug!(
                owner_id = %source.owner_id(),
                count = products.len(),
                "Delivering snapshot"
            );
            on_snapshot(products);
            true
        }
        Err(e) => {
            warn!(owner_id = %source.owner_id(), error = %e, "Snapshot fetch failed");
            on_error(e);
            false
        }
    }
}
