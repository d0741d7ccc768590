//! # CLI Error Type
//!
//! Every command fails with a [`CliError`]: the kind's user-facing message
//! plus the underlying detail.
//!
//! ```text
//! $ shelf login a@b.com --password nope
//! error: Invalid credentials. Check your email and password. (INVALID_PASSWORD)
//! ```

use serde::Serialize;
use shelf_client::{ClientError, ViewError};
use shelf_core::{ErrorKind, ValidationError};

/// Result type alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Command failure as shown to the user.
///
/// ## Serialization
/// With `--json` this is printed as:
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "The requested item was not found.",
///   "detail": "Product not found: products/test/u1/p9"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliError {
    /// Machine-readable kind.
    pub code: ErrorKind,

    /// Human-readable message for the kind.
    pub message: String,

    /// What actually went wrong, when it adds anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CliError {
    pub fn new(code: ErrorKind, detail: impl Into<String>) -> Self {
        CliError {
            code,
            message: code.user_message().to_string(),
            detail: Some(detail.into()),
        }
    }

    /// Input problem caught by the CLI itself.
    pub fn invalid_input(detail: impl Into<String>) -> Self {
        CliError::new(ErrorKind::InvalidInput, detail)
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        let code = err.kind();
        if code == ErrorKind::Internal {
            tracing::error!(error = %err, "Command failed");
        }
        CliError::new(code, err.to_string())
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        CliError::new(err.kind(), err.to_string())
    }
}

/// Failure already recorded on the live catalog view.
impl From<ViewError> for CliError {
    fn from(err: ViewError) -> Self {
        CliError {
            code: err.kind,
            message: err.message,
            detail: None,
        }
    }
}

/// Terminal prompt failed (no TTY, input closed).
impl From<dialoguer::Error> for CliError {
    fn from(err: dialoguer::Error) -> Self {
        CliError::new(ErrorKind::Internal, format!("prompt failed: {err}"))
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({}: {})", self.message, self.code, detail),
            None => write!(f, "{} ({})", self.message, self.code),
        }
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_db::DbError;

    #[test]
    fn test_client_error_keeps_kind() {
        let err = CliError::from(ClientError::from(DbError::DuplicateEmail {
            email: "a@b.com".into(),
        }));

        assert_eq!(err.code, ErrorKind::DuplicateEmail);
        assert_eq!(err.message, ErrorKind::DuplicateEmail.user_message());
        assert!(err.detail.as_deref().is_some_and(|d| d.contains("a@b.com")));
    }

    #[test]
    fn test_view_error_keeps_kind() {
        let err = CliError::from(ViewError::from(ErrorKind::NotFound));

        assert_eq!(err.code, ErrorKind::NotFound);
        assert_eq!(err.message, ErrorKind::NotFound.user_message());
        assert_eq!(err.detail, None);
    }

    #[test]
    fn test_prompt_failure_is_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "input closed");
        let err = CliError::from(dialoguer::Error::IO(io));

        assert_eq!(err.code, ErrorKind::Internal);
        assert!(err.detail.as_deref().is_some_and(|d| d.contains("input closed")));
    }

    #[test]
    fn test_json_shape() {
        let err = CliError::invalid_input("nothing to change");
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], "INVALID_INPUT");
        assert_eq!(json["detail"], "nothing to change");
    }
}
