//! # Live Catalog
//!
//! The local product cache. It mirrors the signed-in user's subscription
//! snapshot into a [`CatalogView`] published on a `watch` channel.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SessionManager ──AuthState──► follow() ──set_owner(uid)──┐            │
//! │                                                           ▼            │
//! │  add/update/remove ──► ProductRepository ──ChangeFeed──► Subscription   │
//! │        │                                                  │            │
//! │        └── error only                       full snapshot │            │
//! │                 ▼                                         ▼            │
//! │            CatalogView.error            CatalogView.products (sorted)  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes never touch `products` directly; the next snapshot is the only
//! thing that changes the cached list.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use shelf_core::{AuthState, ErrorKind, NewProduct, Product, ProductPatch};
use shelf_db::{DbError, ProductRepository, Subscription};

use crate::error::{ClientError, ClientResult};

/// What a product list screen renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    /// Whose products these are. `None` when signed out.
    pub owner_id: Option<String>,
    /// Latest snapshot, sorted by name.
    pub products: Vec<Product>,
    /// True from opening a subscription until its first snapshot or error.
    pub loading: bool,
    /// Last failure.
    pub error: Option<ViewError>,
}

/// A failure shown next to the list: the kind plus its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<ErrorKind> for ViewError {
    fn from(kind: ErrorKind) -> Self {
        ViewError {
            kind,
            message: kind.user_message().to_string(),
        }
    }
}

/// Subscription-backed cache of one owner's products.
#[derive(Debug)]
pub struct LiveCatalog {
    repo: ProductRepository,
    view_tx: Arc<watch::Sender<CatalogView>>,
    subscription: Mutex<Option<Subscription>>,
}

impl LiveCatalog {
    pub fn new(repo: ProductRepository) -> Self {
        let (view_tx, _) = watch::channel(CatalogView::default());
        Self {
            repo,
            view_tx: Arc::new(view_tx),
            subscription: Mutex::new(None),
        }
    }

    // =========================================================================
    // Owner
    // =========================================================================

    /// Points the cache at a new owner.
    ///
    /// The previous subscription is released before the new one opens, so
    /// two streams never feed the same view. Must be called from within a
    /// Tokio runtime.
    pub fn set_owner(&self, owner_id: Option<&str>) {
        let mut slot = self.subscription_slot();
        if let Some(previous) = slot.take() {
            previous.unsubscribe();
        }

        let Some(owner_id) = owner_id else {
            debug!("Catalog cleared");
            self.view_tx.send_replace(CatalogView::default());
            return;
        };

        info!(owner_id = %owner_id, "Catalog following owner");
        self.view_tx.send_replace(CatalogView {
            owner_id: Some(owner_id.to_string()),
            products: Vec::new(),
            loading: true,
            error: None,
        });

        let on_snapshot = {
            let view_tx = Arc::clone(&self.view_tx);
            let owner = owner_id.to_string();
            move |products: Vec<Product>| {
                view_tx.send_if_modified(|view| {
                    if view.owner_id.as_deref() != Some(owner.as_str()) {
                        return false;
                    }
                    view.products = products;
                    view.loading = false;
                    true
                });
            }
        };

        let on_error = {
            let view_tx = Arc::clone(&self.view_tx);
            let owner = owner_id.to_string();
            move |error: DbError| {
                view_tx.send_if_modified(|view| {
                    if view.owner_id.as_deref() != Some(owner.as_str()) {
                        return false;
                    }
                    view.error = Some(ViewError::from(error.kind()));
                    view.loading = false;
                    true
                });
            }
        };

        *slot = Some(self.repo.subscribe(owner_id, on_snapshot, on_error));
    }

    /// Keeps the owner in step with the session.
    ///
    /// The task ends when the session manager or this catalog is dropped.
    pub fn follow(self: &Arc<Self>, mut auth: watch::Receiver<AuthState>) -> JoinHandle<()> {
        let catalog: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let owner = auth.borrow_and_update().user_id().map(str::to_string);

                let Some(live) = catalog.upgrade() else {
                    break;
                };
                if live.owner_id() != owner {
                    live.set_owner(owner.as_deref());
                }
                drop(live);

                if auth.changed().await.is_err() {
                    debug!("Session closed, catalog follower stopping");
                    break;
                }
            }
        })
    }

    // =========================================================================
    // View
    // =========================================================================

    pub fn view(&self) -> CatalogView {
        self.view_tx.borrow().clone()
    }

    pub fn products(&self) -> Vec<Product> {
        self.view_tx.borrow().products.clone()
    }

    pub fn owner_id(&self) -> Option<String> {
        self.view_tx.borrow().owner_id.clone()
    }

    /// Subscribes to view changes.
    pub fn watch(&self) -> watch::Receiver<CatalogView> {
        self.view_tx.subscribe()
    }

    pub fn clear_error(&self) {
        self.view_tx.send_if_modified(|view| view.error.take().is_some());
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates a product for the current owner.
    pub async fn add(&self, input: &NewProduct) -> ClientResult<Product> {
        let owner = self.require_owner()?;
        let result = self.repo.create(&owner, input).await;
        self.settle(result)
    }

    pub async fn get(&self, product_id: &str) -> ClientResult<Product> {
        let owner = self.require_owner()?;
        let result = self.repo.read(&owner, product_id).await;
        self.settle(result)
    }

    pub async fn update(&self, product_id: &str, patch: &ProductPatch) -> ClientResult<()> {
        let owner = self.require_owner()?;
        let result = self.repo.update(&owner, product_id, patch).await;
        self.settle(result)
    }

    pub async fn remove(&self, product_id: &str) -> ClientResult<()> {
        let owner = self.require_owner()?;
        let result = self.repo.delete(&owner, product_id).await;
        self.settle(result)
    }

    fn require_owner(&self) -> ClientResult<String> {
        self.owner_id()
            .ok_or_else(|| self.record(ClientError::Unauthenticated))
    }

    fn settle<T>(&self, result: Result<T, DbError>) -> ClientResult<T> {
        result.map_err(|e| self.record(ClientError::from(e)))
    }

    fn record(&self, error: ClientError) -> ClientError {
        debug!(error = %error, "Catalog operation failed");
        let shown = ViewError::from(error.kind());
        self.view_tx.send_modify(|view| view.error = Some(shown));
        error
    }

    fn subscription_slot(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionManager;
    use crate::storage::MemoryStore;
    use shelf_db::{Database, DbConfig, HashingConfig};
    use std::time::Duration;
    use tokio::time::timeout;

    async fn setup() -> (Database, Arc<LiveCatalog>) {
        let db = Database::new(DbConfig::in_memory().hashing(HashingConfig::minimal()))
            .await
            .unwrap();
        let catalog = Arc::new(LiveCatalog::new(db.products("test")));
        (db, catalog)
    }

    async fn wait_until(
        rx: &mut watch::Receiver<CatalogView>,
        ready: impl FnMut(&CatalogView) -> bool,
    ) -> CatalogView {
        timeout(Duration::from_secs(5), rx.wait_for(ready))
            .await
            .expect("timed out waiting for catalog view")
            .expect("catalog dropped")
            .clone()
    }

    fn names(view: &CatalogView) -> Vec<&str> {
        view.products.iter().map(|p| p.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_snapshots_replace_products_sorted() {
        let (_db, catalog) = setup().await;
        let mut rx = catalog.watch();

        catalog.set_owner(Some("owner-1"));
        let view = wait_until(&mut rx, |v| !v.loading).await;
        assert!(view.products.is_empty());

        for name in ["banana", "Apple", "cherry"] {
            catalog.add(&NewProduct::new(name, "1", "")).await.unwrap();
        }

        let view = wait_until(&mut rx, |v| v.products.len() == 3).await;
        assert_eq!(names(&view), ["Apple", "banana", "cherry"]);
        assert_eq!(view.owner_id.as_deref(), Some("owner-1"));
        assert_eq!(view.error, None);
    }

    #[tokio::test]
    async fn test_writes_without_owner_fail() {
        let (_db, catalog) = setup().await;

        let err = catalog
            .add(&NewProduct::new("Pen", "2.50", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
        let shown = catalog.view().error.unwrap();
        assert_eq!(shown.kind, ErrorKind::Unauthenticated);
        assert_eq!(shown.message, ErrorKind::Unauthenticated.user_message());

        catalog.clear_error();
        assert_eq!(catalog.view().error, None);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cached_list() {
        let (_db, catalog) = setup().await;
        let mut rx = catalog.watch();

        catalog.set_owner(Some("owner-1"));
        catalog.add(&NewProduct::new("Pen", "2.50", "")).await.unwrap();
        let before = wait_until(&mut rx, |v| v.products.len() == 1).await;

        let err = catalog
            .update("missing", &ProductPatch::default().price("3"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = catalog
            .add(&NewProduct::new("", "1", ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let view = catalog.view();
        assert_eq!(view.products, before.products);
        assert_eq!(view.error, Some(ViewError::from(ErrorKind::InvalidInput)));
    }

    #[tokio::test]
    async fn test_subscription_error_keeps_kind() {
        let (db, catalog) = setup().await;
        let mut rx = catalog.watch();
        db.close().await;

        catalog.set_owner(Some("owner-1"));
        let view = wait_until(&mut rx, |v| !v.loading).await;

        let shown = view.error.unwrap();
        assert_eq!(shown.kind, ErrorKind::Unavailable);
        assert_eq!(shown.message, ErrorKind::Unavailable.user_message());
    }

    #[tokio::test]
    async fn test_switching_owner_replaces_stream() {
        let (db, catalog) = setup().await;
        let repo = db.products("test");
        repo.create("owner-1", &NewProduct::new("Mine", "1", ""))
            .await
            .unwrap();
        repo.create("owner-2", &NewProduct::new("Theirs", "1", ""))
            .await
            .unwrap();

        let mut rx = catalog.watch();
        catalog.set_owner(Some("owner-1"));
        let view = wait_until(&mut rx, |v| !v.loading).await;
        assert_eq!(names(&view), ["Mine"]);

        catalog.set_owner(Some("owner-2"));
        let view = wait_until(&mut rx, |v| {
            v.owner_id.as_deref() == Some("owner-2") && !v.loading
        })
        .await;
        assert_eq!(names(&view), ["Theirs"]);

        // Writes to the old owner no longer reach the view.
        repo.create("owner-1", &NewProduct::new("Late", "1", ""))
            .await
            .unwrap();
        repo.create("owner-2", &NewProduct::new("Again", "1", ""))
            .await
            .unwrap();
        let view = wait_until(&mut rx, |v| v.products.len() == 2).await;
        assert_eq!(names(&view), ["Again", "Theirs"]);

        catalog.set_owner(None);
        assert_eq!(catalog.view(), CatalogView::default());
    }

    #[tokio::test]
    async fn test_follow_tracks_session() {
        let (db, catalog) = setup().await;
        let sessions = Arc::new(SessionManager::new(
            db.credentials("test"),
            Arc::new(MemoryStore::new()),
            true,
        ));
        sessions.start().await;

        let follower = catalog.follow(sessions.watch_state());
        let mut rx = catalog.watch();

        let outcome = sessions.register("a@b.com", "secret1").await.unwrap();
        let uid = outcome.user_id().to_string();
        let view = wait_until(&mut rx, |v| {
            v.owner_id.as_deref() == Some(uid.as_str()) && !v.loading
        })
        .await;
        assert!(view.products.is_empty());

        sessions.logout().await;
        let view = wait_until(&mut rx, |v| v.owner_id.is_none()).await;
        assert_eq!(view, CatalogView::default());

        drop(sessions);
        timeout(Duration::from_secs(5), follower)
            .await
            .expect("follower did not stop")
            .unwrap();
    }
}
