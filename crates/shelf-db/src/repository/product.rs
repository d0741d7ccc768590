//! # Product Repository
//!
//! Per-owner product CRUD and live subscriptions.
//!
//! Products live in the owner's subcollection
//! (`artifacts/{namespace}/users/{ownerId}/products/{productId}`); every
//! query is keyed by `(namespace, owner_id)`. Writes publish a
//! [`ChangeEvent`] after they commit, which is what keeps subscriptions
//! current.

use chrono::Utc;
use shelf_core::validation::{coerce_price, require_id, validate_product_name};
use shelf_core::{sort_by_name, NewProduct, Product, ProductPatch};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::product_path;
use crate::error::{DbError, DbResult};
use crate::feed::{ChangeEvent, ChangeFeed, ChangeOp};
use crate::subscription::Subscription;

const PRODUCT_COLUMNS: &str = "id, owner_id, name, price, description, \
     created_by, updated_by, created_at, updated_at";

/// An empty owner means nobody is signed in.
fn require_owner(owner_id: &str) -> DbResult<&str> {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        return Err(DbError::Unauthenticated);
    }
    Ok(owner_id)
}

/// Repository for product operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products("my-app");
///
/// let pen = repo.create(&uid, &NewProduct::new("Pen", "2.50", "blue")).await?;
/// repo.update(&uid, &pen.id, &ProductPatch::default().price(3.0)).await?;
///
/// let _sub = repo.subscribe(&uid, |products| render(products), |e| show(e));
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    namespace: String,
    feed: ChangeFeed,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, namespace: impl Into<String>, feed: ChangeFeed) -> Self {
        ProductRepository {
            pool,
            namespace: namespace.into(),
            feed,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Opens a live query over the owner's products.
    ///
    /// `on_snapshot` receives the full set sorted by name, first when the
    /// query opens and then after every write to this owner's subcollection.
    /// An empty `owner_id` is reported through `on_error` (never a panic or
    /// a returned error) and yields an inert handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<S, E>(&self, owner_id: &str, on_snapshot: S, mut on_error: E) -> Subscription
    where
        S: FnMut(Vec<Product>) + Send + 'static,
        E: FnMut(DbError) + Send + 'static,
    {
        let owner_id = match require_owner(owner_id) {
            Ok(owner_id) => owner_id,
            Err(e) => {
                on_error(e);
                return Subscription::inert(owner_id);
            }
        };

        // Listen before the first fetch so no write slips between the two.
        let events = self.feed.subscribe();
        Subscription::open(self.snapshot_source(owner_id), events, on_snapshot, on_error)
    }

    /// Creates a product under the owner's subcollection.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The stored record with its server-assigned id
    /// * `Err(DbError::Unauthenticated)` - Empty owner id
    /// * `Err(DbError::Validation)` - Missing name or non-numeric price
    pub async fn create(&self, owner_id: &str, input: &NewProduct) -> DbResult<Product> {
        let owner_id = require_owner(owner_id)?;
        let name = validate_product_name(&input.name)?;
        let price = coerce_price(&input.price)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name,
            price,
            description: input.description.trim().to_string(),
            created_by: owner_id.to_string(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        };

        debug!(
            path = %product_path(&self.namespace, owner_id, &product.id),
            "Creating product"
        );

        sqlx::query(
            r#"
            INSERT INTO products (
                namespace, owner_id, id, name, price, description,
                created_by, updated_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&self.namespace)
        .bind(&product.owner_id)
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.created_by)
        .bind(&product.updated_by)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        self.publish(owner_id, &product.id, ChangeOp::Created);
        Ok(product)
    }

    /// Reads one product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Found under this owner
    /// * `Err(DbError::NotFound)` - No such id under this owner (even if
    ///   another owner has one)
    pub async fn read(&self, owner_id: &str, product_id: &str) -> DbResult<Product> {
        let owner_id = require_owner(owner_id)?;
        let product_id = require_id("productId", product_id)?;

        self.get(owner_id, product_id).await?.ok_or_else(|| {
            DbError::not_found("Product", product_path(&self.namespace, owner_id, product_id))
        })
    }

    /// Like [`read`](Self::read) but a miss is `Ok(None)`.
    pub async fn get(&self, owner_id: &str, product_id: &str) -> DbResult<Option<Product>> {
        let owner_id = require_owner(owner_id)?;
        let product_id = require_id("productId", product_id)?;

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE namespace = ?1 AND owner_id = ?2 AND id = ?3"
        );
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(&self.namespace)
            .bind(owner_id)
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Merges the given fields into an existing product.
    ///
    /// Only fields present in the patch are written; `updatedAt` and
    /// `updatedBy` are always stamped.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful
    /// * `Err(DbError::Validation)` - Empty ids, empty name, bad price
    /// * `Err(DbError::NotFound)` - Product doesn't exist under this owner
    pub async fn update(&self, owner_id: &str, product_id: &str, patch: &ProductPatch) -> DbResult<()> {
        let owner_id = require_id("ownerId", owner_id)?;
        let product_id = require_id("productId", product_id)?;

        let name = patch.name.as_deref().map(validate_product_name).transpose()?;
        let price = patch.price.as_ref().map(coerce_price).transpose()?;
        let description = patch.description.as_deref().map(|d| d.trim().to_string());

        debug!(
            path = %product_path(&self.namespace, owner_id, product_id),
            empty_patch = patch.is_empty(),
            "Updating product"
        );

        let mut query = QueryBuilder::<Sqlite>::new("UPDATE products SET updated_at = ");
        query.push_bind(Utc::now());
        query.push(", updated_by = ").push_bind(owner_id.to_string());
        if let Some(name) = name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(price) = price {
            query.push(", price = ").push_bind(price);
        }
        if let Some(description) = description {
            query.push(", description = ").push_bind(description);
        }
        query
            .push(" WHERE namespace = ")
            .push_bind(self.namespace.clone())
            .push(" AND owner_id = ")
            .push_bind(owner_id.to_string())
            .push(" AND id = ")
            .push_bind(product_id.to_string());

        let result = query.build().execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "Product",
                product_path(&self.namespace, owner_id, product_id),
            ));
        }

        self.publish(owner_id, product_id, ChangeOp::Updated);
        Ok(())
    }

    /// Deletes a product. Deleting an id that does not exist succeeds.
    pub async fn delete(&self, owner_id: &str, product_id: &str) -> DbResult<()> {
        let owner_id = require_id("ownerId", owner_id)?;
        let product_id = require_id("productId", product_id)?;

        debug!(
            path = %product_path(&self.namespace, owner_id, product_id),
            "Deleting product"
        );

        let result = sqlx::query(
            "DELETE FROM products WHERE namespace = ?1 AND owner_id = ?2 AND id = ?3",
        )
        .bind(&self.namespace)
        .bind(owner_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            self.publish(owner_id, product_id, ChangeOp::Deleted);
        } else {
            debug!(product_id = %product_id, "Delete matched nothing");
        }

        Ok(())
    }

    /// Returns the owner's full product set, sorted by name.
    pub async fn list(&self, owner_id: &str) -> DbResult<Vec<Product>> {
        let owner_id = require_owner(owner_id)?;
        self.snapshot_source(owner_id).fetch().await
    }

    /// Number of products the owner has.
    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let owner_id = require_owner(owner_id)?;

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE namespace = ?1 AND owner_id = ?2",
        )
        .bind(&self.namespace)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    fn snapshot_source(&self, owner_id: &str) -> SnapshotSource {
        SnapshotSource {
            pool: self.pool.clone(),
            namespace: self.namespace.clone(),
            owner_id: owner_id.to_string(),
        }
    }

    fn publish(&self, owner_id: &str, product_id: &str, op: ChangeOp) {
        self.feed.publish(ChangeEvent {
            namespace: self.namespace.clone(),
            owner_id: owner_id.to_string(),
            product_id: product_id.to_string(),
            op,
        });
    }
}

/// What a subscription task needs to re-read one subcollection. Holds no
/// feed sender, so the feed closes once every repository is gone.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotSource {
    pool: SqlitePool,
    namespace: String,
    owner_id: String,
}

impl SnapshotSource {
    pub(crate) fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub(crate) async fn fetch(&self) -> DbResult<Vec<Product>> {
        // Creation order first so equal names keep a stable order.
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE namespace = ?1 AND owner_id = ?2 \
             ORDER BY created_at, id"
        );
        let mut products = sqlx::query_as::<_, Product>(&sql)
            .bind(&self.namespace)
            .bind(&self.owner_id)
            .fetch_all(&self.pool)
            .await?;

        sort_by_name(&mut products);
        Ok(products)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashingConfig;
    use crate::pool::{Database, DbConfig};
    use shelf_core::{ErrorKind, PriceInput};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn setup() -> (Database, ProductRepository) {
        let db = Database::new(DbConfig::in_memory().hashing(HashingConfig::minimal()))
            .await
            .unwrap();
        let repo = db.products("test-app");
        (db, repo)
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.name.as_str()).collect()
    }

    /// Subscribes and forwards every callback into a channel.
    fn watch(
        repo: &ProductRepository,
        owner: &str,
    ) -> (
        Subscription,
        mpsc::UnboundedReceiver<Vec<Product>>,
        mpsc::UnboundedReceiver<DbError>,
    ) {
        let (snap_tx, snap_rx) = mpsc::unbounded_channel();
        let (err_tx, err_rx) = mpsc::unbounded_channel();
        let sub = repo.subscribe(
            owner,
            move |products| {
                let _ = snap_tx.send(products);
            },
            move |e| {
                let _ = err_tx.send(e);
            },
        );
        (sub, snap_rx, err_rx)
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for callback")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_create_then_read_coerces_price() {
        let (_db, repo) = setup().await;

        let created = repo
            .create("u-1", &NewProduct::new("Pen", "19.90", "blue"))
            .await
            .unwrap();
        let read = repo.read("u-1", &created.id).await.unwrap();

        assert_eq!(read.price, 19.9);
        assert_eq!(read.name, "Pen");
        assert_eq!(read.created_by, "u-1");
        assert_eq!(read.updated_by, None);
        assert_eq!(read.created_at, read.updated_at);
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_db, repo) = setup().await;

        let err = repo
            .create("", &NewProduct::new("Pen", 1.0, ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let err = repo
            .create("u-1", &NewProduct::new("  ", 1.0, ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = repo
            .create("u-1", &NewProduct::new("Pen", "two", ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(repo.count("u-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_other_owner_is_not_found() {
        let (_db, repo) = setup().await;

        let theirs = repo
            .create("owner-a", &NewProduct::new("Secret", 5.0, ""))
            .await
            .unwrap();

        let err = repo.read("owner-b", &theirs.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(repo.get("owner-b", &theirs.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_is_a_partial_merge() {
        let (_db, repo) = setup().await;

        let pen = repo
            .create("u-1", &NewProduct::new("Pen", "2.50", "blue"))
            .await
            .unwrap();
        repo.update("u-1", &pen.id, &ProductPatch::default().price("3"))
            .await
            .unwrap();

        let updated = repo.read("u-1", &pen.id).await.unwrap();
        assert_eq!(updated.price, 3.0);
        assert_eq!(updated.name, "Pen");
        assert_eq!(updated.description, "blue");
        assert_eq!(updated.updated_by.as_deref(), Some("u-1"));
        assert_eq!(updated.created_at, pen.created_at);
        assert!(updated.updated_at >= pen.updated_at);
    }

    #[tokio::test]
    async fn test_update_errors() {
        let (_db, repo) = setup().await;

        let err = repo
            .update("u-1", "missing", &ProductPatch::default().name("X"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = repo
            .update("", "p", &ProductPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let pen = repo
            .create("u-1", &NewProduct::new("Pen", 1.0, ""))
            .await
            .unwrap();
        let err = repo
            .update("u-1", &pen.id, &ProductPatch::default().price(PriceInput::Number(-2.0)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let (_db, repo) = setup().await;

        repo.delete("u-1", "does-not-exist").await.unwrap();

        let err = repo.delete("u-1", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = repo.delete("", "p").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_list_is_sorted_case_insensitively() {
        let (_db, repo) = setup().await;

        for name in ["banana", "Apple", "cherry"] {
            repo.create("u-1", &NewProduct::new(name, 1.0, ""))
                .await
                .unwrap();
        }

        let products = repo.list("u-1").await.unwrap();
        assert_eq!(names(&products), vec!["Apple", "banana", "cherry"]);
    }

    #[tokio::test]
    async fn test_subscribe_with_empty_owner_reports_error() {
        let (_db, repo) = setup().await;

        let (sub, _snaps, mut errors) = watch(&repo, "");

        let err = next(&mut errors).await;
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        assert!(!sub.is_active());
    }

    #[tokio::test]
    async fn test_subscribe_delivers_sorted_snapshots() {
        let (_db, repo) = setup().await;
        let (_sub, mut snaps, _errors) = watch(&repo, "u-1");

        assert!(next(&mut snaps).await.is_empty());

        for name in ["banana", "Apple", "cherry"] {
            repo.create("u-1", &NewProduct::new(name, 1.0, ""))
                .await
                .unwrap();
        }

        // One snapshot per write; the last one has everything.
        let mut latest = Vec::new();
        for _ in 0..3 {
            latest = next(&mut snaps).await;
            let mut sorted = latest.clone();
            sort_by_name(&mut sorted);
            assert_eq!(latest, sorted);
        }
        assert_eq!(names(&latest), vec!["Apple", "banana", "cherry"]);
    }

    #[tokio::test]
    async fn test_subscription_ignores_other_owners() {
        let (_db, repo) = setup().await;
        let (_sub, mut snaps, _errors) = watch(&repo, "u-1");
        assert!(next(&mut snaps).await.is_empty());

        repo.create("u-2", &NewProduct::new("Theirs", 1.0, ""))
            .await
            .unwrap();
        repo.create("u-1", &NewProduct::new("Mine", 1.0, ""))
            .await
            .unwrap();

        let snapshot = next(&mut snaps).await;
        assert_eq!(names(&snapshot), vec!["Mine"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (_db, repo) = setup().await;
        let (sub, mut snaps, _errors) = watch(&repo, "u-1");
        assert!(next(&mut snaps).await.is_empty());
        assert!(sub.is_active());

        sub.unsubscribe();
        repo.create("u-1", &NewProduct::new("Pen", 1.0, ""))
            .await
            .unwrap();

        // The sender lived in the aborted task, so the channel closes.
        let after = timeout(Duration::from_secs(5), snaps.recv()).await.unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn test_closed_store_ends_subscription_with_error() {
        let (db, repo) = setup().await;
        let (_sub, mut snaps, mut errors) = watch(&repo, "u-1");
        assert!(next(&mut snaps).await.is_empty());

        repo.create("u-1", &NewProduct::new("Pen", 1.0, ""))
            .await
            .unwrap();
        assert_eq!(next(&mut snaps).await.len(), 1);

        db.close().await;
        repo.publish("u-1", "anything", ChangeOp::Updated);

        let err = next(&mut errors).await;
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    async fn setup_tiny_feed() -> (Database, ProductRepository) {
        let mut config = DbConfig::in_memory().hashing(HashingConfig::minimal());
        config.feed_capacity = 1;
        let db = Database::new(config).await.unwrap();
        let repo = db.products("test-app");
        (db, repo)
    }

    #[tokio::test]
    async fn test_lagged_subscription_refetches() {
        let (db, repo) = setup_tiny_feed().await;
        let (_sub, mut snaps, _errors) = watch(&repo, "u-1");
        assert!(next(&mut snaps).await.is_empty());

        // A write whose event never reaches the subscriber.
        let unannounced = ProductRepository::new(db.pool().clone(), "test-app", ChangeFeed::new(1));
        unannounced
            .create("u-1", &NewProduct::new("Quiet", 1.0, ""))
            .await
            .unwrap();

        // Overflow the one-slot receiver with events for another owner.
        for i in 0..3 {
            repo.publish("u-2", &format!("p{i}"), ChangeOp::Created);
        }

        let snapshot = next(&mut snaps).await;
        assert_eq!(names(&snapshot), ["Quiet"]);
    }

    #[tokio::test]
    async fn test_burst_of_writes_converges_on_tiny_feed() {
        let (_db, repo) = setup_tiny_feed().await;
        let (_sub, mut snaps, mut errors) = watch(&repo, "u-1");
        assert!(next(&mut snaps).await.is_empty());

        for i in 0..10 {
            repo.create("u-1", &NewProduct::new(format!("Item {i:02}"), 1.0, ""))
                .await
                .unwrap();
        }

        let mut latest = next(&mut snaps).await;
        while latest.len() < 10 {
            latest = next(&mut snaps).await;
        }
        assert_eq!(names(&latest)[0], "Item 00");
        assert_eq!(names(&latest)[9], "Item 09");
        assert!(errors.try_recv().is_err());
    }
}
