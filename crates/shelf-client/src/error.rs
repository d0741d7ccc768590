//! Client error type.

use shelf_core::{ErrorKind, ValidationError};
use shelf_db::DbError;
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Everything the session manager, catalog and bootstrap can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Store / Input
    // =========================================================================
    /// Store failure or credential outcome, kind preserved.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Local validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Session
    // =========================================================================
    /// No signed-in user.
    #[error("Not signed in")]
    Unauthenticated,

    /// Login or register attempted while a session is active.
    #[error("Already signed in as {uid}; log out first")]
    AlreadyAuthenticated { uid: String },

    /// Login or register attempted before the stored session was restored.
    #[error("Session manager has not finished starting")]
    NotReady,

    // =========================================================================
    // Device Storage
    // =========================================================================
    /// Key-value storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Session blob could not be encoded.
    #[error("Session encoding failed: {0}")]
    SessionEncoding(String),

    // =========================================================================
    // Configuration
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Db(e) => e.kind(),
            ClientError::Validation(e) => e.kind(),
            ClientError::Unauthenticated => ErrorKind::Unauthenticated,
            ClientError::AlreadyAuthenticated { .. } => ErrorKind::InvalidInput,
            ClientError::NotReady => ErrorKind::Unavailable,
            ClientError::Storage(_) | ClientError::SessionEncoding(_) => ErrorKind::Internal,
            ClientError::InvalidConfig(_)
            | ClientError::ConfigLoadFailed(_)
            | ClientError::ConfigSaveFailed(_) => ErrorKind::Unavailable,
        }
    }

    /// Human-readable message for the error's kind.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::SessionEncoding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            ClientError::from(DbError::InvalidPassword).kind(),
            ErrorKind::InvalidPassword
        );
        assert_eq!(
            ClientError::AlreadyAuthenticated { uid: "u".into() }.kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(ClientError::NotReady.kind(), ErrorKind::Unavailable);
        assert_eq!(
            ClientError::Unauthenticated.user_message(),
            ErrorKind::Unauthenticated.user_message()
        );
    }
}
