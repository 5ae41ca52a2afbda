//! # Local Cart Store
//!
//! The anonymous visitor's cart, persisted under the `cart` key of device
//! storage.
//!
//! Every call is synchronous and best-effort. A failed write is logged and
//! swallowed: the engine's in-memory view stays correct for this process
//! even if the change does not survive a restart. A missing, unreadable or
//! malformed entry reads as an empty cart.

use std::sync::Arc;
use tracing::{debug, warn};

use bazaar_core::Cart;

use crate::storage::{KeyValueStorage, CART_KEY};

#[derive(Clone)]
pub struct LocalCartStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl LocalCartStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        LocalCartStore { storage }
    }

    /// Reads the persisted cart, failing closed to empty.
    ///
    /// Lines that break cart invariants (quantity ≤ 0, repeated product)
    /// are repaired on the way in, so what comes back is always a valid
    /// cart.
    pub fn read(&self) -> Cart {
        let raw = match self.storage.get(CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cart::new(),
            Err(e) => {
                warn!(error = %e, "Device cart unreadable, using empty cart");
                return Cart::new();
            }
        };

        match serde_json::from_str::<Cart>(&raw) {
            Ok(cart) => {
                debug!(lines = cart.line_count(), "Loaded device cart");
                cart
            }
            Err(e) => {
                warn!(error = %e, "Malformed device cart, using empty cart");
                Cart::new()
            }
        }
    }

    /// Persists the whole cart.
    pub fn write(&self, cart: &Cart) {
        let json = match serde_json::to_string(cart) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Could not serialize device cart");
                return;
            }
        };

        if let Err(e) = self.storage.set(CART_KEY, &json) {
            warn!(error = %e, lines = cart.line_count(), "Device cart not persisted");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(CART_KEY) {
            warn!(error = %e, "Device cart not cleared");
        }
    }
}

impl std::fmt::Debug for LocalCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCartStore").finish_non_exhaustive()
    }
}
