//! # Domain Types
//!
//! Core domain types used throughout Shelf.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Session      │   │   AuthState     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (server)    │   │  uid            │   │  Uninitialized  │       │
//! │  │  owner_id       │   │  email          │   │  Loading        │       │
//! │  │  name           │   │  issued_at      │   │  Authenticated  │       │
//! │  │  price (f64)    │   │  created_at     │   │  Anonymous      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   NewProduct    │   │  ProductPatch   │   │   PriceInput    │       │
//! │  │  name, price,   │   │  every field    │   │  Number(f64)    │       │
//! │  │  description    │   │  optional       │   │  Text(String)   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use feruca::Collator;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Price Input
// =============================================================================

/// A price as typed by the user: either already numeric or free text.
///
/// Screens hand over whatever the form produced; the repository coerces it
/// (see [`crate::validation::coerce_price`]) so the stored value is always a
/// number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum PriceInput {
    Number(f64),
    Text(String),
}

impl From<f64> for PriceInput {
    fn from(value: f64) -> Self {
        PriceInput::Number(value)
    }
}

impl From<&str> for PriceInput {
    fn from(value: &str) -> Self {
        PriceInput::Text(value.to_string())
    }
}

impl From<String> for PriceInput {
    fn from(value: String) -> Self {
        PriceInput::Text(value)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    /// Server-assigned identifier.
    pub id: String,

    /// User id of the subcollection owner.
    pub owner_id: String,

    /// Display name, never empty.
    pub name: String,

    /// Always numeric, never negative.
    pub price: f64,

    pub description: String,

    /// Who created the record (always the owner).
    pub created_by: String,

    /// Who last updated the record, if it was ever updated.
    pub updated_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub price: PriceInput,
    #[serde(default)]
    pub description: String,
}

impl NewProduct {
    pub fn new(
        name: impl Into<String>,
        price: impl Into<PriceInput>,
        description: impl Into<String>,
    ) -> Self {
        NewProduct {
            name: name.into(),
            price: price.into(),
            description: description.into(),
        }
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<PriceInput>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProductPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn price(mut self, price: impl Into<PriceInput>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when the patch would only bump `updatedAt`.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none() && self.description.is_none()
    }
}

/// Sorts products by name using Unicode collation (CLDR root order), ignoring
/// case. Accented names sort next to their base letters, so "Água" comes
/// before "banana". Products whose names compare equal keep their relative
/// order.
pub fn sort_by_name(products: &mut [Product]) {
    let mut collator = Collator::default();
    let keys: Vec<String> = products.iter().map(|p| p.name.to_lowercase()).collect();

    let mut order: Vec<usize> = (0..products.len()).collect();
    order.sort_by(|&a, &b| collator.collate(keys[a].as_str(), keys[b].as_str()));

    let sorted: Vec<Product> = order.iter().map(|&i| products[i].clone()).collect();
    products.clone_from_slice(&sorted);
}

// =============================================================================
// Users and Sessions
// =============================================================================

/// Public view of a registered user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    pub id: String,
    /// Normalized (lowercased, trimmed) email.
    pub email: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// The on-device session blob.
///
/// Trust is positional: if a well-formed blob is present in device storage
/// the session is considered active. It is not signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    pub uid: String,
    pub email: String,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    /// Copied from the user record when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Builds a session for a freshly verified or registered user.
    pub fn issue(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Session {
            uid: uid.into(),
            email: email.into(),
            issued_at: Utc::now(),
            created_at: None,
        }
    }

    /// Copies the user record fields into the session.
    pub fn with_profile(mut self, profile: &UserProfile) -> Self {
        self.created_at = Some(profile.created_at);
        self
    }

    /// A blob is usable only if both identity fields are present.
    pub fn is_well_formed(&self) -> bool {
        !self.uid.trim().is_empty() && !self.email.trim().is_empty()
    }
}

/// Session manager state.
///
/// ```text
/// Uninitialized ──start──► Loading ──restore ok──► Authenticated(uid)
///                              │                        │      ▲
///                              └──no session──► Anonymous ◄────┘ logout
///                                                  │             │
///                                                  └─login/register
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, TS)]
#[serde(tag = "status", content = "session", rename_all = "snake_case")]
#[ts(export)]
pub enum AuthState {
    #[default]
    Uninitialized,
    Loading,
    Authenticated(Session),
    Anonymous,
}

impl AuthState {
    /// Returns the signed-in user id, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::Authenticated(session) => Some(session.uid.as_str()),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    /// True until the initial restore has finished.
    #[inline]
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Uninitialized | AuthState::Loading)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
