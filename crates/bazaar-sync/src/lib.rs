//! # bazaar-sync: Cart/Wishlist Sync Engine for Bazaar Storefront
//!
//! Keeps the visible cart consistent across a device-scoped store for
//! anonymous visitors and an account-scoped store for signed-in users,
//! while the authentication state changes underneath it.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Sync Architecture                     │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 StorefrontContext (process-wide)                 │  │
//! │  │  init: storage → AuthSession → engine → resolve → listener       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  AuthSession   │  │ CartSyncEngine │  │  WishlistStore         │    │
//! │  │                │  │                │  │                        │    │
//! │  │ identity +     │─►│ Resolving      │  │ device only, no        │    │
//! │  │ SignedIn /     │  │ Anonymous      │  │ migration on sign-in   │    │
//! │  │ SignedOut      │  │ Authenticated  │  │                        │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │                 ┌────────────┴────────────┐                             │
//! │                 ▼                         ▼                             │
//! │  ┌──────────────────────────┐  ┌──────────────────────────────────┐    │
//! │  │ LocalCartStore           │  │ RemoteCartStore (+ RemotePolicy) │    │
//! │  │ KeyValueStorage "cart"   │  │ SqlCartStore → user_cart rows    │    │
//! │  │ sync, best-effort        │  │ async, timeout + bounded retry   │    │
//! │  └──────────────────────────┘  └──────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`auth`] - `AuthSession`, `CredentialProvider`, `AuthEvent`
//! - [`config`] - Storefront configuration (TOML + env)
//! - [`context`] - `StorefrontContext` lifecycle
//! - [`engine`] - `CartSyncEngine` state machine and auth listener
//! - [`error`] - Error types
//! - [`local_cart`] - Device cart store
//! - [`remote`] - Remote cart store trait, SQL backend, retry policy
//! - [`storage`] - Device key-value storage
//! - [`wishlist`] - Device wishlist store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_sync::{SqlCartStore, StorefrontConfig, StorefrontContext};
//!
//! let config = StorefrontConfig::load_or_default(None);
//! let remote = Arc::new(SqlCartStore::open(config.db_config()).await?);
//! let ctx = StorefrontContext::init(&config, provider, remote).await;
//!
//! ctx.cart().add(product).await?;
//! println!("Cart ({})", ctx.cart().cart_count());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod local_cart;
pub mod remote;
pub mod storage;
pub mod wishlist;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{AuthEvent, AuthSession, AuthSubscription, CredentialProvider};
pub use config::StorefrontConfig;
pub use context::{init_tracing, StorefrontContext};
pub use engine::{run_auth_listener, spawn_auth_listener, CartSyncEngine, CartView, SyncPhase};
pub use error::{
    AuthError, CartError, CartFailure, CartResult, ConfigError, RemoteError, RemoteOp,
    StorageError,
};
pub use local_cart::LocalCartStore;
pub use remote::{RemoteCartStore, RemotePolicy, SqlCartStore};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, CART_KEY, WISHLIST_KEY};
pub use wishlist::WishlistStore;
