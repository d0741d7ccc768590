//! # Validation Module
//!
//! Input normalization and validation for Shelf.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Screens / CLI                                                │
//! │  ├── Password confirmation                                             │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (shelf-db)                                      │
//! │  ├── THIS MODULE: normalization + business rules                       │
//! │  └── Runs before any store round-trip                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── PRIMARY KEY on (namespace, email) closes the register race       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use shelf_core::validation::{normalize_email, validate_email, validate_password};
//!
//! let email = normalize_email(" Ana@Example.COM ");
//! validate_email(&email).unwrap();
//! validate_password("secret1").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::PriceInput;
use crate::{MAX_EMAIL_LENGTH, MAX_PRODUCT_NAME_LENGTH, MIN_PASSWORD_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Credentials
// =============================================================================

/// Lowercases and trims an email.
///
/// Idempotent: `normalize_email(normalize_email(e)) == normalize_email(e)`.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates an already normalized email.
///
/// ## Rules
/// - Must not be empty
/// - Must contain `@` with something on both sides
/// - The domain part must contain a `.`
/// - At most 254 characters
///
/// ## Example
/// ```rust
/// use shelf_core::validation::validate_email;
///
/// assert!(validate_email("a@b.com").is_ok());
/// assert!(validate_email("a@b").is_err());
/// assert!(validate_email("").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }

    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
        });
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::invalid_format("email", "missing '@'"));
    };

    if local.is_empty() || domain.is_empty() {
        return Err(ValidationError::invalid_format(
            "email",
            "must look like name@domain",
        ));
    }

    if !domain.contains('.') {
        return Err(ValidationError::invalid_format(
            "email",
            "domain must contain '.'",
        ));
    }

    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid_format(
            "email",
            "must not contain spaces",
        ));
    }

    Ok(())
}

/// Validates a password chosen at registration.
///
/// At least [`MIN_PASSWORD_LENGTH`] characters. No other policy.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LENGTH,
        });
    }

    Ok(())
}

/// Login only requires a non-empty password; the length rule is not
/// re-checked so older accounts keep working.
pub fn require_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }
    Ok(())
}

// =============================================================================
// Products
// =============================================================================

/// Validates and trims a product name.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
///
/// ## Example
/// ```rust
/// use shelf_core::validation::validate_product_name;
///
/// assert_eq!(validate_product_name("  Pen ").unwrap(), "Pen");
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > MAX_PRODUCT_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_PRODUCT_NAME_LENGTH,
        });
    }

    Ok(name.to_string())
}

/// Coerces a typed-in price to a number.
///
/// ## Rules
/// - Text is trimmed and must parse completely as a decimal number
/// - `NaN` and infinities are rejected, even when spelled out
/// - Negative prices are rejected; zero is allowed
///
/// ```text
/// "2.50"  ──► 2.5
/// " 3 "   ──► 3.0
/// "abc"   ──► InvalidFormat
/// "-1"    ──► Negative
/// ""      ──► Required
/// ```
pub fn coerce_price(input: &PriceInput) -> ValidationResult<f64> {
    let value = match input {
        PriceInput::Number(n) => *n,
        PriceInput::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(ValidationError::required("price"));
            }
            text.parse::<f64>()
                .map_err(|_| ValidationError::invalid_format("price", "not a number"))?
        }
    };

    if !value.is_finite() {
        return Err(ValidationError::invalid_format("price", "not a finite number"));
    }

    if value < 0.0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }

    // Folds -0.0 into 0.0.
    Ok(value + 0.0)
}

// =============================================================================
// Identifiers
// =============================================================================

/// Rejects empty identifiers (owner ids, product ids).
pub fn require_id<'a>(field: &str, value: &'a str) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================
