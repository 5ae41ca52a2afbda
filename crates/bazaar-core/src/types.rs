//! # Domain Types
//!
//! Identifier newtypes and the product snapshot carried by every cart line.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐   │
//! │  │   ProductId     │   │   ProductSnapshot    │   │    LineItem     │   │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │   │
//! │  │  opaque string  │◄──│  id                  │◄──│  product (flat) │   │
//! │  └─────────────────┘   │  name, image_url     │   │  quantity ≥ 1   │   │
//! │                        │  price               │   └─────────────────┘   │
//! │  ┌─────────────────┐   │  discount_price      │                         │
//! │  │    Identity     │   └──────────────────────┘   ┌─────────────────┐   │
//! │  │  ─────────────  │             ▲                │   CartTotals    │   │
//! │  │  signed-in user │             │                │  ─────────────  │   │
//! │  │  (never empty)  │      WishlistItem (alias)    │  derived only   │   │
//! │  └─────────────────┘                              └─────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshots, Not References
//! A line item stores a frozen copy of the product fields it needs to render.
//! The local backend persists that copy as-is; the remote backend rebuilds it
//! from a join against the products table on every read.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        ProductId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        ProductId(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        ProductId(id)
    }
}

/// Opaque identifier of a signed-in user.
///
/// Present only while authenticated. Whether one exists is the sole thing
/// that decides which cart backend is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity, rejecting blank values.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::Identity;
    ///
    /// assert!(Identity::new("user-42").is_ok());
    /// assert!(Identity::new("  ").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "identity".to_string(),
            });
        }
        Ok(Identity(id))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Product Snapshot
// =============================================================================

/// The product fields a cart or wishlist needs to render a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSnapshot {
    pub id: ProductId,

    pub name: String,

    /// Primary image, if the catalog has one.
    #[serde(default)]
    pub image_url: Option<String>,

    /// List price.
    pub price: Money,

    /// Sale price. Only honored when lower than `price`.
    #[serde(default)]
    pub discount_price: Option<Money>,
}

impl ProductSnapshot {
    /// Creates a snapshot with no image and no discount.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money) -> Self {
        ProductSnapshot {
            id: id.into(),
            name: name.into(),
            image_url: None,
            price,
            discount_price: None,
        }
    }

    pub fn with_discount(mut self, discount_price: Money) -> Self {
        self.discount_price = Some(discount_price);
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// The unit price actually charged.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::{Money, ProductSnapshot};
    ///
    /// let shoe = ProductSnapshot::new("p-1", "Runner", Money::from_cents(8000))
    ///     .with_discount(Money::from_cents(6000));
    /// assert_eq!(shoe.effective_price(), Money::from_cents(6000));
    /// ```
    pub fn effective_price(&self) -> Money {
        match self.discount_price {
            Some(discount) if discount < self.price => discount,
            _ => self.price,
        }
    }
}

/// A wishlist entry is a denormalized product snapshot with no quantity.
pub type WishlistItem = ProductSnapshot;

// =============================================================================
// Line Item
// =============================================================================

/// One product's quantity entry within a cart.
///
/// The snapshot is flattened on the wire, so a persisted line reads
/// `{"id":"p-1","name":"Runner","price":8000,"quantity":2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    #[serde(flatten)]
    pub product: ProductSnapshot,

    /// Always at least 1 inside a `Cart`.
    pub quantity: i64,
}

impl LineItem {
    pub fn new(product: ProductSnapshot, quantity: i64) -> Self {
        LineItem { product, quantity }
    }

    #[inline]
    pub fn product_id(&self) -> &ProductId {
        &self.product.id
    }

    /// Effective unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.product.effective_price().multiply_quantity(self.quantity)
    }

    /// What the line would cost at list price.
    pub fn list_total(&self) -> Money {
        self.product.price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Summary numbers for the cart page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    /// Distinct products.
    pub line_count: usize,

    /// Sum of quantities (the badge number).
    pub item_count: i64,

    /// Sum of line totals at effective prices.
    pub subtotal: Money,

    /// List-price total minus `subtotal`.
    pub savings: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================
