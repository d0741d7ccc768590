//! # shelf-core: Pure Domain Logic for Shelf
//!
//! This crate holds the rules every other layer agrees on: what a product
//! looks like, how an email is normalized, how a typed-in price becomes a
//! number, how the catalog is ordered, and which error kinds the screens
//! must be ready to show.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Shelf Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Screens / CLI (apps/shelf-cli)                  │   │
//! │  │      Login ──► Register ──► Product list ──► Add / Edit         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │           shelf-client (SessionManager, LiveCatalog)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        shelf-db (CredentialStore, ProductRepository)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ shelf-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │validation │  │   error   │                  │   │
//! │  │   │  Product  │  │  email    │  │ ErrorKind │                  │   │
//! │  │   │  Session  │  │  price    │  │ messages  │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Session, AuthState, etc.)
//! - [`error`] - Error kinds and validation errors
//! - [`validation`] - Input normalization and validation
//!
//! ## Example Usage
//!
//! ```rust
//! use shelf_core::validation::{coerce_price, normalize_email};
//! use shelf_core::PriceInput;
//!
//! assert_eq!(normalize_email("  Foo@Bar.com "), "foo@bar.com");
//!
//! let price = coerce_price(&PriceInput::Text("19.90".into())).unwrap();
//! assert_eq!(price, 19.9);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ErrorKind, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Namespace used when no application id is configured.
///
/// Every user, email index entry and product lives under
/// `artifacts/{namespace}/...`, so two apps sharing one store never see
/// each other's data.
pub const DEFAULT_NAMESPACE: &str = "shelf-default";

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum product name length.
pub const MAX_PRODUCT_NAME_LENGTH: usize = 200;

/// Maximum email length (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;
