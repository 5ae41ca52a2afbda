//! # Storefront Configuration
//!
//! Where the device cart lives, how the remote cart is reached, and how long
//! the engine is willing to wait for either.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BAZAAR_STORAGE_DIR=/var/lib/bazaar                                 │
//! │     BAZAAR_REMOTE_TIMEOUT_SECS=5                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/storefront.toml (Linux)                       │
//! │     ~/Library/Application Support/com.bazaar.storefront/... (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     platform data dir, 10s remote timeout, 3 retries                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # storefront.toml
//! [storage]
//! dir = "/home/me/.local/share/storefront"
//!
//! [remote]
//! database_path = "/home/me/.local/share/storefront/bazaar.db"
//! timeout_secs = 10
//! max_retries = 3
//! initial_backoff_ms = 200
//! max_backoff_secs = 5
//!
//! [auth]
//! resolve_timeout_secs = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use bazaar_db::DbConfig;

use crate::error::ConfigError;
use crate::remote::RemotePolicy;

// =============================================================================
// Storage Settings
// =============================================================================

/// Device storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the `cart` and `wishlist` entries.
    /// Defaults to the platform data directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Remote cart backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// SQLite file holding `products` and `user_cart`.
    /// Defaults to `bazaar.db` in the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Upper bound on a single remote call (seconds).
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    /// Set to 0 to surface the first failure directly.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff between retries (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_remote_timeout() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff() -> u64 {
    200
}
fn default_max_backoff() -> u64 {
    5
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            database_path: None,
            timeout_secs: default_remote_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

/// Identity resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// How long startup waits for the credential provider before treating
    /// the visitor as anonymous (seconds).
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,
}

fn default_resolve_timeout() -> u64 {
    5
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            resolve_timeout_secs: default_resolve_timeout(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete storefront configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub auth: AuthSettings,
}

impl StorefrontConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (storefront.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                let contents = std::fs::read_to_string(&path)?;
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
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Storefront config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "remote.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.auth.resolve_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "auth.resolve_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.remote.initial_backoff_ms > self.remote.max_backoff_secs.saturating_mul(1000) {
            return Err(ConfigError::Invalid(format!(
                "remote.initial_backoff_ms ({}) exceeds remote.max_backoff_secs ({})",
                self.remote.initial_backoff_ms, self.remote.max_backoff_secs
            )));
        }

        if let Some(ref dir) = self.storage.dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("storage.dir must not be empty".into()));
            }
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("BAZAAR_STORAGE_DIR") {
            debug!(dir = %dir, "Overriding storage dir from environment");
            self.storage.dir = Some(PathBuf::from(dir));
        }

        if let Ok(path) = std::env::var("BAZAAR_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.remote.database_path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("BAZAAR_REMOTE_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.remote.timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid BAZAAR_REMOTE_TIMEOUT_SECS"),
            }
        }

        if let Ok(retries) = std::env::var("BAZAAR_REMOTE_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(r) => self.remote.max_retries = r,
                Err(_) => warn!(value = %retries, "Ignoring invalid BAZAAR_REMOTE_MAX_RETRIES"),
            }
        }

        if let Ok(secs) = std::env::var("BAZAAR_AUTH_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.auth.resolve_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid BAZAAR_AUTH_TIMEOUT_SECS"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "bazaar", "storefront")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("storefront.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Directory for device storage, falling back to the platform data dir
    /// and then to `./storefront-data`.
    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("./storefront-data"))
    }

    /// SQLite file for the remote cart.
    pub fn database_path(&self) -> PathBuf {
        self.remote
            .database_path
            .clone()
            .unwrap_or_else(|| self.storage_dir().join("bazaar.db"))
    }

    /// Database settings for [`SqlCartStore::open`](crate::SqlCartStore::open).
    /// A pooled connection is never awaited longer than one remote call.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
            .acquire_timeout(Duration::from_secs(self.remote.timeout_secs))
    }

    pub fn remote_policy(&self) -> RemotePolicy {
        RemotePolicy {
            timeout: Duration::from_secs(self.remote.timeout_secs),
            max_retries: self.remote.max_retries,
            initial_backoff: Duration::from_millis(self.remote.initial_backoff_ms),
            max_backoff: Duration::from_secs(self.remote.max_backoff_secs),
        }
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.resolve_timeout_secs)
    }
}
