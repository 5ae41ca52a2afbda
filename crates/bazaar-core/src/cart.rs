//! # Cart
//!
//! The pure cart model shared by both backends.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations (anonymous path)                     │
//! │                                                                         │
//! │  UI Action               Cart method               Change               │
//! │  ─────────               ───────────               ──────               │
//! │                                                                         │
//! │  Add to cart ──────────► add_product() ──────────► qty += 1 or append   │
//! │                                                                         │
//! │  Change quantity ──────► set_quantity() ─────────► qty = n, n ≤ 0 drops │
//! │                                                                         │
//! │  Remove ───────────────► remove() ───────────────► line filtered out    │
//! │                                                                         │
//! │  Empty cart ───────────► clear() ────────────────► no lines             │
//! │                                                                         │
//! │  Badge / totals ───────► count() / totals() ─────► (derived, read only) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The authenticated path never mutates a `Cart` in place; it sends the
//! change to the remote store and replaces the whole cart with a fresh read.
//!
//! ## Invariants
//! - At most one line per product id
//! - Every line has `1 <= quantity <= MAX_ITEM_QUANTITY`
//! - Every price and discount price is in `0..=MAX_PRICE_CENTS`
//! - At most `MAX_CART_ITEMS` lines can be added through `add_product`
//!
//! These hold for every `Cart` value, including ones deserialized from
//! device storage, because the only constructor that takes raw lines
//! normalizes them.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartTotals, LineItem, ProductId, ProductSnapshot};
use crate::validation::{validate_cart_size, validate_price_cents};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart
// =============================================================================

/// An ordered collection of line items.
///
/// Serialized as a bare JSON array of line items, which is exactly the
/// layout of the device-storage `cart` entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Builds a cart from raw lines, repairing anything that breaks the
    /// invariants.
    ///
    /// - lines with quantity ≤ 0 are dropped
    /// - lines with a negative or out-of-range price are dropped
    /// - for a repeated product id only the first line is kept
    /// - quantities above the maximum are clamped
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::{Cart, LineItem, Money, ProductSnapshot};
    ///
    /// let tee = ProductSnapshot::new("tee", "Tee", Money::from_cents(1500));
    /// let cart = Cart::from_items(vec![
    ///     LineItem::new(tee.clone(), 2),
    ///     LineItem::new(tee, 5),
    /// ]);
    /// assert_eq!(cart.line_count(), 1);
    /// assert_eq!(cart.count(), 2);
    /// ```
    pub fn from_items(items: Vec<LineItem>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|line| line.quantity > 0)
            .filter(|line| has_valid_prices(&line.product))
            .filter(|line| seen.insert(line.product.id.clone()))
            .map(|mut line| {
                line.quantity = line.quantity.min(MAX_ITEM_QUANTITY);
                line
            })
            .collect();

        Cart { items }
    }

    /// The lines, in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    pub fn get(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|line| &line.product.id == product_id)
    }

    /// Quantity held for a product, 0 when absent.
    pub fn quantity_of(&self, product_id: &ProductId) -> i64 {
        self.get(product_id).map_or(0, |line| line.quantity)
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.get(product_id).is_some()
    }

    /// The quantity a line would hold after one more "add to cart".
    ///
    /// Checked against both limits, so it is safe to send to a backend.
    pub fn quantity_after_add(&self, product_id: &ProductId) -> CoreResult<i64> {
        match self.get(product_id) {
            Some(line) => {
                let next = line.quantity + 1;
                if next > MAX_ITEM_QUANTITY {
                    return Err(CoreError::QuantityTooLarge {
                        requested: next,
                        max: MAX_ITEM_QUANTITY,
                    });
                }
                Ok(next)
            }
            None => {
                validate_cart_size(self.items.len())
                    .map_err(|_| CoreError::CartTooLarge { max: MAX_CART_ITEMS })?;
                Ok(1)
            }
        }
    }

    /// Adds one unit of a product.
    ///
    /// An existing line keeps its original snapshot and gains one unit;
    /// otherwise the product is appended with quantity 1.
    pub fn add_product(&mut self, product: &ProductSnapshot) -> CoreResult<i64> {
        validate_price_cents(product.price.cents())?;
        if let Some(discount) = product.discount_price {
            validate_price_cents(discount.cents())?;
        }
        let next = self.quantity_after_add(&product.id)?;

        match self.items.iter_mut().find(|line| line.product.id == product.id) {
            Some(line) => line.quantity = next,
            None => self.items.push(LineItem::new(product.clone(), next)),
        }

        Ok(next)
    }

    /// Replaces a line's quantity.
    ///
    /// ## Behavior
    /// - `quantity <= 0` removes the line
    /// - a product not in the cart is left alone and `Ok(false)` is returned
    /// - `quantity > MAX_ITEM_QUANTITY` is rejected without changing anything
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> CoreResult<bool> {
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let Some(pos) = self.items.iter().position(|line| &line.product.id == product_id) else {
            return Ok(false);
        };

        if quantity <= 0 {
            self.items.remove(pos);
        } else {
            self.items[pos].quantity = quantity;
        }
        Ok(true)
    }

    /// Removes a product's line. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.product.id != product_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct products.
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of quantities over all lines. This is the cart badge number.
    pub fn count(&self) -> i64 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum of line totals at effective prices.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn totals(&self) -> CartTotals {
        let subtotal = self.subtotal();
        let list: Money = self.items.iter().map(LineItem::list_total).sum();

        CartTotals {
            line_count: self.line_count(),
            item_count: self.count(),
            subtotal,
            savings: list - subtotal,
        }
    }
}

fn has_valid_prices(product: &ProductSnapshot) -> bool {
    validate_price_cents(product.price.cents()).is_ok()
        && product
            .discount_price
            .map_or(true, |discount| validate_price_cents(discount.cents()).is_ok())
}

impl<'de> Deserialize<'de> for Cart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<LineItem>::deserialize(deserializer).map(Cart::from_items)
    }
}

impl From<Vec<LineItem>> for Cart {
    fn from(items: Vec<LineItem>) -> Self {
        Cart::from_items(items)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
