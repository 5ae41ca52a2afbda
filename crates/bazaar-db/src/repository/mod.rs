//! # Repository Module
//!
//! Database repositories for the storefront schema.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  SqlCartStore (bazaar-sync)                                            │
//! │       │                                                                 │
//! │       │  db.carts().upsert("user-1", "prod-1", 2)                      │
//! │       ▼                                                                 │
//! │  CartRepository                                                        │
//! │  ├── list_for_user(&self, user_id)     joined with products            │
//! │  ├── upsert(&self, user_id, product_id, quantity)                      │
//! │  ├── remove(&self, user_id, product_id)                                │
//! │  └── clear(&self, user_id)                                             │
//! │                                                                         │
//! │  ProductRepository                                                     │
//! │  ├── insert / get_by_id / list_active / set_active                     │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CartRepository`](cart::CartRepository) - Per-user cart rows
//! - [`ProductRepository`](product::ProductRepository) - Catalog rows

pub mod cart;
pub mod product;
