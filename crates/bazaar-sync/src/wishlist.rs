//! # Wishlist Store
//!
//! Saved products, kept on the device only. There is no remote wishlist and
//! no migration on sign-in or sign-out; the same list is visible whatever
//! the authentication state.
//!
//! The store keeps the list in memory and writes it through on every change,
//! so a failed write leaves this process correct and only loses the change
//! across a restart.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use bazaar_core::{ProductId, Wishlist, WishlistItem};

use crate::storage::{KeyValueStorage, WISHLIST_KEY};

pub struct WishlistStore {
    storage: Arc<dyn KeyValueStorage>,
    current: Mutex<Wishlist>,
}

impl WishlistStore {
    /// Creates the store and loads the persisted list.
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let initial = load(storage.as_ref());
        WishlistStore {
            storage,
            current: Mutex::new(initial),
        }
    }

    fn current(&self) -> MutexGuard<'_, Wishlist> {
        self.current.lock().unwrap_or_else(|poisoned| {
            error!("Wishlist lock poisoned, keeping in-memory list");
            poisoned.into_inner()
        })
    }

    pub fn read(&self) -> Wishlist {
        self.current().clone()
    }

    /// Saves a product. Returns `false` if it was already saved, in which
    /// case nothing is written.
    pub fn add(&self, item: WishlistItem) -> bool {
        let mut current = self.current();
        let product_id = item.id.clone();
        if !current.add(item) {
            return false;
        }
        debug!(product_id = %product_id, "Added to wishlist");
        persist(self.storage.as_ref(), &current);
        true
    }

    /// Returns `false` if the product was not saved.
    pub fn remove(&self, product_id: &ProductId) -> bool {
        let mut current = self.current();
        if !current.remove(product_id) {
            return false;
        }
        debug!(product_id = %product_id, "Removed from wishlist");
        persist(self.storage.as_ref(), &current);
        true
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.current().contains(product_id)
    }

    /// Re-reads device storage, picking up writes from other windows.
    pub fn reload(&self) -> Wishlist {
        let fresh = load(self.storage.as_ref());
        let mut current = self.current();
        *current = fresh;
        current.clone()
    }
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore")
            .field("len", &self.current().len())
            .finish_non_exhaustive()
    }
}

fn load(storage: &dyn KeyValueStorage) -> Wishlist {
    match storage.get(WISHLIST_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Malformed wishlist, using empty wishlist");
            Wishlist::new()
        }),
        Ok(None) => Wishlist::new(),
        Err(e) => {
            warn!(error = %e, "Wishlist unreadable, using empty wishlist");
            Wishlist::new()
        }
    }
}

fn persist(storage: &dyn KeyValueStorage, wishlist: &Wishlist) {
    match serde_json::to_string(wishlist) {
        Ok(json) => {
            if let Err(e) = storage.set(WISHLIST_KEY, &json) {
                warn!(error = %e, "Wishlist not persisted");
            }
        }
        Err(e) => warn!(error = %e, "Could not serialize wishlist"),
    }
}
