//! # Sync Error Types
//!
//! Error types for the stores, the auth session and the engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  StorageError   │  │  RemoteError    │  │  AuthError              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Io             │  │  Unavailable    │  │  InvalidCredentials     │ │
//! │  │  InvalidKey     │  │  Timeout        │  │  Unavailable            │ │
//! │  │  Unavailable    │  │  Rejected       │  │  Rejected               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  swallowed at   │  │  wrapped into   │  │  returned by sign_in,   │ │
//! │  │  the store      │  │  CartError      │  │  sign_up, sign_out      │ │
//! │  └─────────────────┘  └────────┬────────┘  └─────────────────────────┘ │
//! │                                ▼                                        │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  CartError (what a cart operation returns to the UI)             │  │
//! │  │  RemoteUnavailable / Timeout / Rejected  { op }                  │  │
//! │  │  NotReady / Domain                                               │  │
//! │  │                                                                  │  │
//! │  │  failure() → SaveFailed  "Could not save your change."           │  │
//! │  │            → LoadFailed  "Could not load your cart."             │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Malformed persisted data is deliberately absent: the stores log it and
//! fall back to an empty collection.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use bazaar_core::CoreError;
use bazaar_db::DbError;

// =============================================================================
// Device Storage
// =============================================================================

/// Device key-value storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error while touching a key.
    #[error("Storage I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key contains characters that cannot name a storage entry.
    #[error("Invalid storage key: '{0}'")]
    InvalidKey(String),

    /// Storage refused the write (quota, read-only medium, ...).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

// =============================================================================
// Remote Store
// =============================================================================

/// Failures of the remote cart store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network or backend failure.
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within the configured timeout.
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The backend refused the request. Retrying the same call cannot help.
    #[error("Remote store rejected the request: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Returns true for failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_) | RemoteError::Timeout(_))
    }
}

impl From<DbError> for RemoteError {
    fn from(err: DbError) -> Self {
        if err.is_transient() {
            RemoteError::Unavailable(err.to_string())
        } else {
            RemoteError::Rejected(err.to_string())
        }
    }
}

/// Which remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOp {
    Read,
    Upsert,
    Remove,
    Clear,
}

impl RemoteOp {
    /// Reads load the cart; everything else saves a change.
    pub fn is_read(&self) -> bool {
        matches!(self, RemoteOp::Read)
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteOp::Read => write!(f, "read"),
            RemoteOp::Upsert => write!(f, "upsert"),
            RemoteOp::Remove => write!(f, "remove"),
            RemoteOp::Clear => write!(f, "clear"),
        }
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Credential provider failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Authentication service unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication rejected: {0}")]
    Rejected(String),

    #[error("Authentication service did not respond within {0:?}")]
    Timeout(Duration),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration load/save/validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

// =============================================================================
// Cart Operations
// =============================================================================

/// The two failures a shopper can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartFailure {
    /// A change was not applied.
    SaveFailed,
    /// The cart could not be fetched.
    LoadFailed,
}

impl CartFailure {
    pub fn user_message(&self) -> &'static str {
        match self {
            CartFailure::SaveFailed => "Could not save your change.",
            CartFailure::LoadFailed => "Could not load your cart.",
        }
    }
}

/// Error returned by every cart operation.
///
/// Whenever one of these is returned, the cart in the published view is the
/// cart that was there before the call.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Remote cart unavailable during {op}: {source}")]
    RemoteUnavailable {
        op: RemoteOp,
        #[source]
        source: RemoteError,
    },

    #[error("Remote cart {op} timed out after {after:?}")]
    Timeout { op: RemoteOp, after: Duration },

    #[error("Remote cart rejected {op}: {reason}")]
    Rejected { op: RemoteOp, reason: String },

    /// No backend is authoritative yet (identity still resolving).
    #[error("Cart is not ready yet")]
    NotReady,

    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl CartError {
    /// Wraps a remote failure with the operation that produced it.
    pub fn remote(op: RemoteOp, err: RemoteError) -> Self {
        match err {
            RemoteError::Timeout(after) => CartError::Timeout { op, after },
            RemoteError::Rejected(reason) => CartError::Rejected { op, reason },
            source @ RemoteError::Unavailable(_) => CartError::RemoteUnavailable { op, source },
        }
    }

    /// The remote operation involved, if any.
    pub fn op(&self) -> Option<RemoteOp> {
        match self {
            CartError::RemoteUnavailable { op, .. }
            | CartError::Timeout { op, .. }
            | CartError::Rejected { op, .. } => Some(*op),
            CartError::NotReady | CartError::Domain(_) => None,
        }
    }

    pub fn failure(&self) -> CartFailure {
        match self.op() {
            Some(op) if op.is_read() => CartFailure::LoadFailed,
            _ => CartFailure::SaveFailed,
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.failure().user_message()
    }

    /// Returns true if the UI should offer a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CartError::RemoteUnavailable { .. } | CartError::Timeout { .. } | CartError::NotReady
        )
    }
}

/// Result type alias for cart operations.
pub type CartResult<T> = Result<T, CartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_retryable() {
        assert!(RemoteError::Unavailable("503".into()).is_retryable());
        assert!(RemoteError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(!RemoteError::Rejected("fk".into()).is_retryable());
    }

    #[test]
    fn test_db_errors_classify() {
        assert!(matches!(
            RemoteError::from(DbError::PoolExhausted),
            RemoteError::Unavailable(_)
        ));
        assert!(matches!(
            RemoteError::from(DbError::check("quantity must be positive")),
            RemoteError::Rejected(_)
        ));
    }

    #[test]
    fn test_failure_messages_are_distinct() {
        let save = CartError::remote(RemoteOp::Upsert, RemoteError::Unavailable("down".into()));
        let load = CartError::remote(RemoteOp::Read, RemoteError::Unavailable("down".into()));

        assert_eq!(save.failure(), CartFailure::SaveFailed);
        assert_eq!(load.failure(), CartFailure::LoadFailed);
        assert_eq!(save.user_message(), "Could not save your change.");
        assert_eq!(load.user_message(), "Could not load your cart.");
    }

    #[test]
    fn test_remote_wrapping() {
        let err = CartError::remote(RemoteOp::Clear, RemoteError::Timeout(Duration::from_secs(3)));
        assert!(matches!(err, CartError::Timeout { op: RemoteOp::Clear, .. }));
        assert!(err.is_retryable());

        let err = CartError::remote(RemoteOp::Upsert, RemoteError::Rejected("fk".into()));
        assert!(matches!(err, CartError::Rejected { op: RemoteOp::Upsert, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_domain_error_is_save_failure() {
        let err = CartError::from(CoreError::CartTooLarge { max: 100 });
        assert_eq!(err.failure(), CartFailure::SaveFailed);
        assert!(!err.is_retryable());
        assert_eq!(err.op(), None);
    }
}
