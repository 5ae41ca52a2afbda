//! # Wishlist
//!
//! A set of product snapshots, one per product id. Device-local only.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use crate::types::{ProductId, WishlistItem};

/// Saved products, in the order they were saved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
}

impl Wishlist {
    pub fn new() -> Self {
        Wishlist { items: Vec::new() }
    }

    /// Builds a wishlist keeping the first entry for each product id.
    pub fn from_items(items: Vec<WishlistItem>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();
        Wishlist { items }
    }

    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    /// Saves a product. Returns `false` if it was already saved.
    pub fn add(&mut self, item: WishlistItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Returns whether anything was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != product_id);
        self.items.len() != before
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|item| &item.id == product_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'de> Deserialize<'de> for Wishlist {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<WishlistItem>::deserialize(deserializer).map(Wishlist::from_items)
    }
}
