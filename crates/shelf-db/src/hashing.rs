//! # Password Hashing
//!
//! Argon2id in PHC string format. Each hash carries its own random salt and
//! cost parameters, so verification works even after the configured cost
//! changes.
//!
//! Both operations are CPU-heavy and run on tokio's blocking pool.
//!
//! Configured costs may not go below [`MIN_MEMORY_KIB`] and
//! [`MIN_ITERATIONS`]. The cheap profile used by tests is only available
//! with `cfg(test)` or the `test-util` feature.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::error::{DbError, DbResult};

/// Lowest memory cost a configuration may ask for (19 MiB).
pub const MIN_MEMORY_KIB: u32 = 19 * 1024;

/// Lowest number of passes a configuration may ask for.
pub const MIN_ITERATIONS: u32 = 2;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Set only by `minimal()`; never read from config files.
    #[serde(skip)]
    pub(crate) below_floor_allowed: bool,
}

impl Default for HashingConfig {
    /// 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        HashingConfig {
            memory_kib: MIN_MEMORY_KIB,
            iterations: MIN_ITERATIONS,
            parallelism: 1,
            below_floor_allowed: false,
        }
    }
}

impl HashingConfig {
    /// Cheapest parameters argon2 accepts, exempt from the cost floor.
    #[cfg(any(test, feature = "test-util"))]
    pub fn minimal() -> Self {
        HashingConfig {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
            below_floor_allowed: true,
        }
    }

    fn hasher(&self) -> DbResult<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| DbError::PasswordHash(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Rejects parameters argon2 would refuse at hash time, and costs below
    /// [`MIN_MEMORY_KIB`] / [`MIN_ITERATIONS`].
    pub fn validate(&self) -> DbResult<()> {
        self.hasher()?;
        if self.below_floor_allowed {
            return Ok(());
        }

        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(DbError::WeakHashing(format!(
                "memory cost {} KiB is below {MIN_MEMORY_KIB} KiB",
                self.memory_kib
            )));
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(DbError::WeakHashing(format!(
                "{} pass(es) is below {MIN_ITERATIONS}",
                self.iterations
            )));
        }
        Ok(())
    }
}

/// Hashes a password with a fresh salt.
pub async fn hash_password(config: HashingConfig, password: String) -> DbResult<String> {
    tokio::task::spawn_blocking(move || -> DbResult<_> {
        let argon2 = config.hasher()?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    })
    .await
    .map_err(|e| DbError::Internal(format!("hashing task failed: {e}")))?
}

/// Checks a password against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; `Err` only when the stored hash itself
/// cannot be parsed. Comparison is done by argon2, never by string equality.
pub async fn verify_password(password: String, stored_hash: String) -> DbResult<bool> {
    tokio::task::spawn_blocking(move || -> DbResult<_> {
        let parsed = PasswordHash::new(&stored_hash)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(DbError::from(e)),
        }
    })
    .await
    .map_err(|e| DbError::Internal(format!("verification task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password(HashingConfig::minimal(), "secret1".to_string())
            .await
            .unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("secret1"));
        assert!(verify_password("secret1".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("secret2".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_salts_differ() {
        let a = hash_password(HashingConfig::minimal(), "same".to_string())
            .await
            .unwrap();
        let b = hash_password(HashingConfig::minimal(), "same".to_string())
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_garbage_hash_is_an_error() {
        let result = verify_password("x".to_string(), "not-a-phc-string".to_string()).await;
        assert!(matches!(result, Err(DbError::PasswordHash(_))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = HashingConfig {
            memory_kib: 1,
            iterations: 0,
            ..HashingConfig::default()
        };
        assert!(matches!(config.validate(), Err(DbError::PasswordHash(_))));
        assert!(HashingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_below_floor_rejected() {
        let weakest = HashingConfig {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
            ..HashingConfig::default()
        };
        assert!(matches!(weakest.validate(), Err(DbError::WeakHashing(_))));

        let few_passes = HashingConfig {
            iterations: 1,
            ..HashingConfig::default()
        };
        assert!(matches!(few_passes.validate(), Err(DbError::WeakHashing(_))));

        let stronger = HashingConfig {
            memory_kib: 64 * 1024,
            iterations: 3,
            ..HashingConfig::default()
        };
        assert!(stronger.validate().is_ok());
    }

    #[test]
    fn test_deserialized_minimal_values_are_not_exempt() {
        assert!(HashingConfig::minimal().validate().is_ok());

        let minimal = HashingConfig::minimal();
        let toml_like = HashingConfig {
            memory_kib: minimal.memory_kib,
            iterations: minimal.iterations,
            parallelism: minimal.parallelism,
            ..HashingConfig::default()
        };
        assert!(toml_like.validate().is_err());
    }
}
