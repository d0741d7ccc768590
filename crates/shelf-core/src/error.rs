//! # Error Types
//!
//! Error kinds and validation errors shared by every Shelf crate.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shelf-core (this file)                                                │
//! │  ├── ErrorKind        - What the screens switch on                     │
//! │  └── ValidationError  - Local input failures (before any I/O)          │
//! │                                                                         │
//! │  shelf-db                                                              │
//! │  └── DbError          - Store failures + credential outcomes           │
//! │                                                                         │
//! │  shelf-client                                                          │
//! │  └── ClientError      - Session / storage / config failures            │
//! │                                                                         │
//! │  Every layer error answers `kind()` → ErrorKind → user_message()       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Error Kind
// =============================================================================

/// The closed set of failure kinds a caller has to handle.
///
/// Screens map these to messages; they must not depend on any store-specific
/// error shape beyond this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ErrorKind {
    /// Missing or malformed required fields, checked locally.
    InvalidInput,
    /// Operation attempted without an active session / owner id.
    Unauthenticated,
    /// An account already exists for this email.
    DuplicateEmail,
    /// No account exists for this email.
    EmailNotFound,
    /// The password does not match.
    InvalidPassword,
    /// The email index points at a user record that does not exist.
    UserRecordMissing,
    /// Entity lookup miss.
    NotFound,
    /// Backing store unreachable, closed or misconfigured.
    Unavailable,
    /// Any other store failure, passed through.
    Internal,
}

impl ErrorKind {
    /// Returns the human-readable message shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Please check the highlighted fields and try again.",
            ErrorKind::Unauthenticated => "You need to sign in first.",
            ErrorKind::DuplicateEmail => "This email is already registered.",
            ErrorKind::EmailNotFound | ErrorKind::InvalidPassword => {
                "Invalid credentials. Check your email and password."
            }
            ErrorKind::UserRecordMissing => {
                "Your account data is incomplete. Please contact support."
            }
            ErrorKind::NotFound => "The requested item was not found.",
            ErrorKind::Unavailable => "The service is unavailable right now. Try again later.",
            ErrorKind::Internal => "Something went wrong. Please try again.",
        }
    }

    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Unauthenticated => "UNAUTHENTICATED",
            ErrorKind::DuplicateEmail => "DUPLICATE_EMAIL",
            ErrorKind::EmailNotFound => "EMAIL_NOT_FOUND",
            ErrorKind::InvalidPassword => "INVALID_PASSWORD",
            ErrorKind::UserRecordMissing => "USER_RECORD_MISSING",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store round-trip. All of them are
/// [`ErrorKind::InvalidInput`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., not a number, not an email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates a Required error for a field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Creates an InvalidFormat error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Validation failures are always [`ErrorKind::InvalidInput`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
