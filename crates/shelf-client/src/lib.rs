//! # shelf-client: Client Runtime for Shelf
//!
//! Wires the document store, the on-device session and the live product
//! cache together. Screens hold one [`ShelfClient`] for the life of the
//! process.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         ShelfClient::init                               │
//! │                                                                         │
//! │   ClientConfig ──► Database ──┬──► CredentialStore ──► SessionManager   │
//! │   (TOML + env)                │                          │ start()      │
//! │                               │                          │ watch_state  │
//! │   KeyValueStore ──────────────┼──────────────────────────┘    │         │
//! │   (FileStore)                 │                               ▼         │
//! │                               └──► ProductRepository ──► LiveCatalog    │
//! │                                                          follow()       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML/env configuration
//! - [`error`] - Client error type
//! - [`storage`] - On-device key-value storage
//! - [`session`] - Session Manager
//! - [`catalog`] - Live product cache

pub mod catalog;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;

pub use catalog::{CatalogView, LiveCatalog, ViewError};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use session::{RegisterOutcome, SessionManager, SESSION_KEY};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use shelf_db::Database;

/// The constructed client. Created once, shared by reference.
#[derive(Debug)]
pub struct ShelfClient {
    config: ClientConfig,
    db: Database,
    session: Arc<SessionManager>,
    catalog: Arc<LiveCatalog>,
    follower: JoinHandle<()>,
}

impl ShelfClient {
    /// Opens the store and restores the session from the configured
    /// directory. An in-memory database gets an in-memory session store.
    pub async fn init(config: ClientConfig) -> ClientResult<Self> {
        let store: Arc<dyn KeyValueStore> = if config.is_in_memory() {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::open(config.storage_dir()?)?)
        };

        Self::with_store(config, store).await
    }

    /// Like [`ShelfClient::init`] with an explicit session store.
    pub async fn with_store(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> ClientResult<Self> {
        config.validate()?;

        let db = Database::new(config.db_config()?).await?;
        let namespace = config.namespace();

        let session = Arc::new(SessionManager::new(
            db.credentials(namespace),
            store,
            config.session.auto_login_after_register,
        ));
        let catalog = Arc::new(LiveCatalog::new(db.products(namespace)));

        let state = session.start().await;
        catalog.set_owner(state.user_id());
        let follower = catalog.follow(session.watch_state());

        info!(
            namespace = %namespace,
            signed_in = state.is_authenticated(),
            "Shelf client ready"
        );

        Ok(Self {
            config,
            db,
            session,
            catalog,
            follower,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn catalog(&self) -> &Arc<LiveCatalog> {
        &self.catalog
    }

    /// Stops following the session, releases the subscription and closes
    /// the store.
    pub async fn shutdown(self) {
        self.follower.abort();
        self.catalog.set_owner(None);
        self.db.close().await;
        info!("Shelf client shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::{AuthState, ErrorKind, NewProduct, ProductPatch};
    use shelf_db::HashingConfig;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::timeout;

    fn memory_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.database.path = Some(PathBuf::from(config::IN_MEMORY_DATABASE));
        config.hashing = HashingConfig::minimal();
        config
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

    #[tokio::test]
    async fn test_register_create_update_delete_logout() {
        let client = ShelfClient::init(memory_config()).await.unwrap();
        assert_eq!(client.session().state(), AuthState::Anonymous);

        let outcome = client.session().register("a@b.com", "secret1").await.unwrap();
        let uid = outcome.user_id().to_string();
        assert_eq!(client.session().current_user_id().as_deref(), Some(uid.as_str()));

        let mut rx = client.catalog().watch();
        wait_until(&mut rx, |v| {
            v.owner_id.as_deref() == Some(uid.as_str()) && !v.loading
        })
        .await;

        let pen = client
            .catalog()
            .add(&NewProduct::new("Pen", "2.50", "blue"))
            .await
            .unwrap();

        let view = wait_until(&mut rx, |v| v.products.len() == 1).await;
        assert_eq!(view.products[0].price, 2.5);
        assert_eq!(view.products[0].description, "blue");

        client
            .catalog()
            .update(&pen.id, &ProductPatch::default().price(3.0))
            .await
            .unwrap();
        let view = wait_until(&mut rx, |v| {
            v.products.first().is_some_and(|p| p.price == 3.0)
        })
        .await;
        assert_eq!(view.products[0].name, "Pen");

        client.catalog().remove(&pen.id).await.unwrap();
        wait_until(&mut rx, |v| v.products.is_empty()).await;

        client.session().logout().await;
        assert_eq!(client.session().state(), AuthState::Anonymous);
        wait_until(&mut rx, |v| v.owner_id.is_none()).await;

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_session_restored_from_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::default();
        config.database.path = Some(dir.path().join("shelf.db"));
        config.session.storage_dir = Some(dir.path().join("session"));
        config.hashing = HashingConfig::minimal();

        let client = ShelfClient::init(config.clone()).await.unwrap();
        let outcome = client.session().register("a@b.com", "secret1").await.unwrap();
        client.shutdown().await;

        let client = ShelfClient::init(config).await.unwrap();
        assert_eq!(
            client.session().current_user_id().as_deref(),
            Some(outcome.user_id())
        );

        let mut rx = client.catalog().watch();
        wait_until(&mut rx, |v| v.owner_id.as_deref() == Some(outcome.user_id())).await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = memory_config();
        config.catalog.namespace = String::new();

        let err = ShelfClient::init(config).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
