//! # bazaar-core: Pure Cart Logic for the Bazaar Storefront
//!
//! This crate holds the cart and wishlist model as pure functions with zero
//! I/O dependencies. Both cart backends (device storage and the remote
//! database) speak in these types.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bazaar Storefront Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI consumers                                 │   │
//! │  │    Catalog ──► Product page ──► Cart page ──► Wishlist          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ StorefrontContext                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-sync                                  │   │
//! │  │    CartSyncEngine, AuthSession, Local/Remote stores             │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────┐   ┌───────▼───────────────────┐   │
//! │  │  ★ bazaar-core (THIS CRATE) ★   │   │  bazaar-db                │   │
//! │  │                                 │◄──│  user_cart + products     │   │
//! │  │  types  money  cart  wishlist   │   │  (SQLite, sqlx)           │   │
//! │  │  validation                     │   └───────────────────────────┘   │
//! │  │                                 │                                   │
//! │  │  NO I/O • NO DATABASE • NO NET  │                                   │
//! │  └─────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Identifiers, product snapshots, line items, totals
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - The cart and its mutation rules
//! - [`wishlist`] - The wishlist set
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::{Cart, Money, ProductSnapshot};
//!
//! let mut cart = Cart::new();
//! let tee = ProductSnapshot::new("tee-01", "Logo Tee", Money::from_cents(2500));
//!
//! cart.add_product(&tee).unwrap();
//! cart.add_product(&tee).unwrap();
//!
//! assert_eq!(cart.count(), 2);
//! assert_eq!(cart.subtotal().to_string(), "$50.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;
pub mod wishlist;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::Cart;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;
pub use wishlist::Wishlist;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct products allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product in a cart.
///
/// ## Business Reason
/// Catches accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest unit price a product may carry, in cents ($10,000,000.00).
///
/// Keeps `price * MAX_ITEM_QUANTITY * MAX_CART_ITEMS` far inside `i64`.
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;
