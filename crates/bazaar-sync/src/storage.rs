//! # Device Storage
//!
//! String-keyed, device-scoped storage for the anonymous cart and the
//! wishlist.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  <storage dir>/                                                         │
//! │    cart.json       [ { "id": "p-1", "name": ..., "quantity": 2 }, ... ] │
//! │    wishlist.json   [ { "id": "p-9", "name": ..., "price": 1299 }, ... ] │
//! │                                                                         │
//! │  Absent file  → None (treated as empty by the stores)                  │
//! │  Write        → <key>.<uuid>.tmp, then rename over <key>.json          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Calls are synchronous. Nothing here locks across processes; when two
//! windows write the same key the last rename wins.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::StorageError;

/// Entry holding the anonymous cart.
pub const CART_KEY: &str = "cart";

/// Entry holding the wishlist.
pub const WISHLIST_KEY: &str = "wishlist";

/// Synchronous string key-value storage.
pub trait KeyValueStorage: Send + Sync {
    /// Returns `Ok(None)` when the key has never been written.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

// =============================================================================
// File Storage
// =============================================================================

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens storage rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::io("<root>", e))?;
        debug!(dir = %dir.display(), "Opened device storage");
        Ok(FileStorage { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        check_key(key)?;
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let tmp = self.dir.join(format!("{key}.{}.tmp", Uuid::new_v4().simple()));

        // A short write leaves a partial temp file behind, same as a failed rename.
        let written = fs::write(&tmp, value).and_then(|()| fs::rename(&tmp, self.path_for(key)));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::io(key, e));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key, e)),
        }
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

/// In-process storage. Contents last as long as the value.
///
/// Used by tests, and as the fallback when the device directory cannot be
/// opened.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `set`/`remove` fail, like a full quota.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            error!("Memory storage lock poisoned, keeping entries");
            poisoned.into_inner()
        })
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        check_key(key)?;
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.check_writable()?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.check_writable()?;
        self.entries().remove(key);
        Ok(())
    }
}
