//! # Repository Module
//!
//! Store access for Shelf, scoped by application namespace.
//!
//! ## Document Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  artifacts/{namespace}/                                                 │
//! │  ├── users/{userId}                    ← CredentialStore (users)        │
//! │  │   └── products/{productId}          ← ProductRepository              │
//! │  └── emails/{normalizedEmail}          ← CredentialStore (email_index)  │
//! │                                                                         │
//! │  Every product query is keyed by (namespace, ownerId), so a caller     │
//! │  can never reach another owner's documents, even with a valid id.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CredentialStore`](credential::CredentialStore) - Registration and verification
//! - [`ProductRepository`](product::ProductRepository) - Product CRUD and live subscriptions

pub mod credential;
pub mod product;

/// `artifacts/{namespace}/users/{userId}`
pub fn user_path(namespace: &str, user_id: &str) -> String {
    format!("artifacts/{namespace}/users/{user_id}")
}

/// `artifacts/{namespace}/emails/{normalizedEmail}`
pub fn email_path(namespace: &str, email: &str) -> String {
    format!("artifacts/{namespace}/emails/{email}")
}

/// `artifacts/{namespace}/users/{ownerId}/products`
pub fn products_path(namespace: &str, owner_id: &str) -> String {
    format!("{}/products", user_path(namespace, owner_id))
}

/// `artifacts/{namespace}/users/{ownerId}/products/{productId}`
pub fn product_path(namespace: &str, owner_id: &str, product_id: &str) -> String {
    format!("{}/{product_id}", products_path(namespace, owner_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(user_path("app", "u1"), "artifacts/app/users/u1");
        assert_eq!(email_path("app", "a@b.com"), "artifacts/app/emails/a@b.com");
        assert_eq!(
            product_path("app", "u1", "p1"),
            "artifacts/app/users/u1/products/p1"
        );
    }
}
