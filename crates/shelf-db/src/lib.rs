//! # shelf-db: Document Store for Shelf
//!
//! SQLite-backed storage for credentials and per-user product
//! subcollections, plus the change feed that drives live subscriptions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shelf Data Flow                                  │
//! │                                                                         │
//! │  SessionManager / LiveCatalog (shelf-client)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     shelf-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  ChangeFeed  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (feed.rs)   │  │   │
//! │  │   │               │    │ CredentialStore│    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo    │───►│ broadcast    │  │   │
//! │  │   │ Migrations    │    │ Subscription   │◄───│ ChangeEvent  │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   users • email_index • products                                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`hashing`] - Argon2id password hashing
//! - [`feed`] - Change feed for committed product writes
//! - [`subscription`] - Live product queries
//! - [`repository`] - Credential Store and Product Repository
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shelf_db::{Database, DbConfig};
//! use shelf_core::NewProduct;
//!
//! let db = Database::new(DbConfig::new("shelf.db")).await?;
//!
//! let uid = db.credentials("my-app").register_credential("a@b.com", "secret1").await?;
//! let products = db.products("my-app");
//! products.create(&uid, &NewProduct::new("Pen", "2.50", "blue")).await?;
//!
//! let _sub = products.subscribe(&uid, |list| println!("{} products", list.len()), |e| eprintln!("{e}"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod feed;
pub mod hashing;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod subscription;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use feed::{ChangeEvent, ChangeFeed, ChangeOp};
pub use hashing::HashingConfig;
pub use pool::{Database, DbConfig};
pub use subscription::Subscription;

// Repository re-exports for convenience
pub use repository::credential::CredentialStore;
pub use repository::product::ProductRepository;
