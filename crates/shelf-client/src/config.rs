//! # Client Configuration
//!
//! Configuration for the Shelf client runtime.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults                                                            │
//! │  2. config.toml in the platform config dir                             │
//! │       Linux:   ~/.config/catalog/config.toml                           │
//! │       macOS:   ~/Library/Application Support/com.shelf.catalog/        │
//! │  3. Environment                                                         │
//! │       SHELF_DB_PATH          → database.path                           │
//! │       SHELF_NAMESPACE        → catalog.namespace                       │
//! │       SHELF_STORAGE_DIR      → session.storage_dir                     │
//! │       SHELF_AUTO_LOGIN       → session.auto_login_after_register       │
//! │       SHELF_HASH_MEMORY_KIB  → hashing.memory_kib                      │
//! │       SHELF_HASH_ITERATIONS  → hashing.iterations                      │
//! │  4. validate()                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use shelf_core::DEFAULT_NAMESPACE;
use shelf_db::{DbConfig, HashingConfig};

use crate::error::{ClientError, ClientResult};

/// Database path that selects an in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

// =============================================================================
// Database Settings
// =============================================================================

/// Where and how to open the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `<data dir>/shelf.db`; `":memory:"` keeps
    /// everything in process memory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Catalog Settings
// =============================================================================

/// Which application namespace user data lives under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            namespace: default_namespace(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Session manager behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Directory for the session blob. Defaults to `<data dir>/session`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Sign the user in right after a successful registration.
    /// When false, registration only creates the account.
    #[serde(default = "default_true")]
    pub auto_login_after_register: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            storage_dir: None,
            auto_login_after_register: true,
        }
    }
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
///
/// ## Example Config File
/// ```toml
/// [database]
/// path = "/var/lib/shelf/shelf.db"
/// max_connections = 5
/// connect_timeout_secs = 30
///
/// [catalog]
/// namespace = "my-shop"
///
/// [session]
/// auto_login_after_register = true
///
/// [hashing]
/// memory_kib = 19456
/// iterations = 2
/// parallelism = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub hashing: HashingConfig,
}

impl ClientConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ClientError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file as pretty TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        if self.catalog.namespace.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "catalog.namespace must not be empty".into(),
            ));
        }

        if self.catalog.namespace.contains('/') {
            return Err(ClientError::InvalidConfig(
                "catalog.namespace must not contain '/'".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ClientError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        self.hashing
            .validate()
            .map_err(|e| ClientError::InvalidConfig(format!("hashing: {e}")))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("SHELF_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(namespace) = std::env::var("SHELF_NAMESPACE") {
            debug!(namespace = %namespace, "Overriding namespace from environment");
            self.catalog.namespace = namespace;
        }

        if let Ok(dir) = std::env::var("SHELF_STORAGE_DIR") {
            self.session.storage_dir = Some(PathBuf::from(dir));
        }

        if let Ok(value) = std::env::var("SHELF_AUTO_LOGIN") {
            match parse_bool(&value) {
                Some(flag) => self.session.auto_login_after_register = flag,
                None => warn!(value = %value, "Ignoring unparseable SHELF_AUTO_LOGIN"),
            }
        }

        if let Ok(value) = std::env::var("SHELF_HASH_MEMORY_KIB") {
            if let Ok(kib) = value.parse::<u32>() {
                self.hashing.memory_kib = kib;
            }
        }

        if let Ok(value) = std::env::var("SHELF_HASH_ITERATIONS") {
            if let Ok(iterations) = value.parse::<u32>() {
                self.hashing.iterations = iterations;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    pub fn namespace(&self) -> &str {
        &self.catalog.namespace
    }

    pub fn is_in_memory(&self) -> bool {
        self.database
            .path
            .as_ref()
            .is_some_and(|p| p.as_os_str() == IN_MEMORY_DATABASE)
    }

    /// Resolved database file path.
    pub fn database_path(&self) -> ClientResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => data_dir().map(|dir| dir.join("shelf.db")),
        }
    }

    /// Resolved session storage directory.
    pub fn storage_dir(&self) -> ClientResult<PathBuf> {
        match &self.session.storage_dir {
            Some(dir) => Ok(dir.clone()),
            None => data_dir().map(|dir| dir.join("session")),
        }
    }

    /// Builds the store configuration.
    pub fn db_config(&self) -> ClientResult<DbConfig> {
        let config = if self.is_in_memory() {
            DbConfig::in_memory()
        } else {
            DbConfig::new(self.database_path()?)
                .max_connections(self.database.max_connections)
                .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
        };

        Ok(config.hashing(self.hashing))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "shelf", "catalog")
}

fn data_dir() -> ClientResult<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| ClientError::InvalidConfig("no home directory; set paths explicitly".into()))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
