//! # Database Error Types
//!
//! Error types for store operations, including the credential outcomes the
//! Credential Store reports.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      ValidationError (shelf-core)          │
//! │       │                                │                                │
//! │       └──────────────┬─────────────────┘                                │
//! │                      ▼                                                  │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ClientError (shelf-client) / ApiError (CLI)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  kind().user_message() shown to the user                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use shelf_core::{ErrorKind, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Local input validation failed before touching the store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No owner id was supplied.
    ///
    /// ## When This Occurs
    /// - Creating, reading or listing products with an empty owner id
    /// - Subscribing before a session exists
    #[error("No signed-in owner for this operation")]
    Unauthenticated,

    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Reading a product id that does not exist under this owner
    /// - Updating a product that was deleted
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The email index already holds this address.
    #[error("Email already registered: {email}")]
    DuplicateEmail { email: String },

    /// No email index entry for this address.
    #[error("No account for email: {email}")]
    EmailNotFound { email: String },

    /// Password verification failed.
    #[error("Password does not match")]
    InvalidPassword,

    /// The email index points at a user record that does not exist.
    ///
    /// ## When This Occurs
    /// - Data corruption, or a user row removed out of band
    #[error("Email index points to missing user record: {user_id}")]
    UserRecordMissing { user_id: String },

    /// Unique constraint violation outside the email index.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - The pool was closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Hashing or hash parsing failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Configured hashing cost is under the production floor.
    #[error("Hashing cost too low: {0}")]
    WeakHashing(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Maps this error onto the kinds callers switch on.
    ///
    /// ```text
    /// Validation                         → InvalidInput
    /// ConnectionFailed / PoolExhausted   → Unavailable
    /// MigrationFailed                    → Unavailable
    /// QueryFailed / Internal / ...       → Internal
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Validation(_) => ErrorKind::InvalidInput,
            DbError::Unauthenticated => ErrorKind::Unauthenticated,
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::DuplicateEmail { .. } => ErrorKind::DuplicateEmail,
            DbError::EmailNotFound { .. } => ErrorKind::EmailNotFound,
            DbError::InvalidPassword => ErrorKind::InvalidPassword,
            DbError::UserRecordMissing { .. } => ErrorKind::UserRecordMissing,
            DbError::ConnectionFailed(_) | DbError::PoolExhausted | DbError::MigrationFailed(_) => {
                ErrorKind::Unavailable
            }
            DbError::UniqueViolation { .. }
            | DbError::QueryFailed(_)
            | DbError::PasswordHash(_)
            | DbError::WeakHashing(_)
            | DbError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>, ..."
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for DbError {
    fn from(err: argon2::password_hash::Error) -> Self {
        DbError::PasswordHash(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            DbError::from(ValidationError::required("name")).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(DbError::not_found("Product", "p1").kind(), ErrorKind::NotFound);
        assert_eq!(DbError::PoolExhausted.kind(), ErrorKind::Unavailable);
        assert_eq!(
            DbError::from(sqlx::Error::PoolClosed).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(DbError::QueryFailed("x".into()).kind(), ErrorKind::Internal);
    }
}
