//! # Credential Store
//!
//! Per-user email/password-hash records plus the email → userId uniqueness
//! index.
//!
//! ## Registration
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register_credential(" Ana@Example.com ", "secret1")                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  normalize + validate (no I/O)                                         │
//! │       │                                                                 │
//! │       ├── index already has email? → DuplicateEmail (skip hashing)     │
//! │       ▼                                                                 │
//! │  Argon2id hash (blocking pool)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    INSERT users (uid, email, hash)                                     │
//! │    INSERT email_index ... ON CONFLICT DO NOTHING                       │
//! │    rows_affected == 0?  → ROLLBACK, DuplicateEmail                     │
//! │  COMMIT → uid                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional index insert is the uniqueness gate. Two racing
//! registrations for one address cannot both commit.

use chrono::Utc;
use shelf_core::validation::{
    normalize_email, require_id, require_password, validate_email, validate_password,
};
use shelf_core::{UserProfile, ValidationError};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{email_path, user_path};
use crate::error::{DbError, DbResult};
use crate::hashing::{self, HashingConfig};

/// Registration and verification against the `users` / `email_index` tables.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    pool: SqlitePool,
    namespace: String,
    hashing: HashingConfig,
}

impl CredentialStore {
    pub fn new(pool: SqlitePool, namespace: impl Into<String>, hashing: HashingConfig) -> Self {
        CredentialStore {
            pool,
            namespace: namespace.into(),
            hashing,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Creates a user and claims its email.
    ///
    /// ## Returns
    /// * `Ok(user_id)` - A new random user id
    /// * `Err(DbError::Validation)` - Malformed email or short password
    /// * `Err(DbError::DuplicateEmail)` - Email already registered
    pub async fn register_credential(&self, email: &str, password: &str) -> DbResult<String> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        debug!(path = %email_path(&self.namespace, &email), "Registering credential");

        if self.user_id_for_email(&email).await?.is_some() {
            return Err(DbError::DuplicateEmail { email });
        }

        let password_hash = hashing::hash_password(self.hashing, password.to_string()).await?;
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (namespace, id, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&self.namespace)
        .bind(&user_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO email_index (namespace, email, user_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (namespace, email) DO NOTHING
            "#,
        )
        .bind(&self.namespace)
        .bind(&email)
        .bind(&user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            warn!(email = %email, "Lost registration race for email");
            return Err(DbError::DuplicateEmail { email });
        }

        tx.commit().await?;

        info!(
            user_id = %user_id,
            path = %user_path(&self.namespace, &user_id),
            "User registered"
        );
        Ok(user_id)
    }

    /// Checks an email/password pair.
    ///
    /// ## Returns
    /// * `Ok(user_id)` - Credentials match
    /// * `Err(DbError::EmailNotFound)` - No index entry for the email
    /// * `Err(DbError::UserRecordMissing)` - Index points at a missing user
    /// * `Err(DbError::InvalidPassword)` - Hash comparison failed
    pub async fn verify_credential(&self, email: &str, password: &str) -> DbResult<String> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ValidationError::required("email").into());
        }
        require_password(password)?;

        debug!(email = %email, "Verifying credential");

        let user_id = self
            .user_id_for_email(&email)
            .await?
            .ok_or_else(|| DbError::EmailNotFound {
                email: email.clone(),
            })?;

        let stored_hash: Option<String> = sqlx::query_scalar(
            "SELECT password_hash FROM users WHERE namespace = ?1 AND id = ?2",
        )
        .bind(&self.namespace)
        .bind(&user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(stored_hash) = stored_hash else {
            warn!(
                user_id = %user_id,
                path = %email_path(&self.namespace, &email),
                "Email index points to a missing user record"
            );
            return Err(DbError::UserRecordMissing { user_id });
        };

        if !hashing::verify_password(password.to_string(), stored_hash).await? {
            debug!(email = %email, "Password mismatch");
            return Err(DbError::InvalidPassword);
        }

        Ok(user_id)
    }

    /// Looks up the user id claimed for a normalized email.
    pub async fn user_id_for_email(&self, email: &str) -> DbResult<Option<String>> {
        let user_id = sqlx::query_scalar(
            "SELECT user_id FROM email_index WHERE namespace = ?1 AND email = ?2",
        )
        .bind(&self.namespace)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    /// Returns the public part of a user record.
    pub async fn profile(&self, user_id: &str) -> DbResult<UserProfile> {
        let user_id = require_id("userId", user_id)?;

        sqlx::query_as::<_, UserProfile>(
            "SELECT id, email, created_at FROM users WHERE namespace = ?1 AND id = ?2",
        )
        .bind(&self.namespace)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", user_path(&self.namespace, user_id)))
    }

    /// Number of registered users in this namespace.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE namespace = ?1")
            .bind(&self.namespace)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
