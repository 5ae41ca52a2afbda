//! # Storefront Context
//!
//! The one place the engine, the wishlist and the auth session live.
//! Built once at startup and handed to UI code by reference.
//!
//! ## Lifecycle
//! ```text
//! init(config, provider, remote)
//!   1. open device storage (falls back to memory if the dir is unusable)
//!   2. AuthSession::start        → identity or anonymous, bounded wait
//!   3. CartSyncEngine::new       → Resolving
//!   4. spawn_auth_listener       → subscribe, resolve(current),
//!                                  then follow auth events
//!
//! shutdown()
//!   aborts the auth listener
//! ```

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthSession, CredentialProvider};
use crate::config::StorefrontConfig;
use crate::engine::{spawn_auth_listener, CartSyncEngine};
use crate::local_cart::LocalCartStore;
use crate::remote::RemoteCartStore;
use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use crate::wishlist::WishlistStore;

pub struct StorefrontContext {
    engine: Arc<CartSyncEngine>,
    wishlist: WishlistStore,
    auth: Arc<AuthSession>,
    listener: Option<JoinHandle<()>>,
}

impl StorefrontContext {
    /// Builds the context with file-backed device storage from `config`.
    pub async fn init(
        config: &StorefrontConfig,
        provider: Arc<dyn CredentialProvider>,
        remote: Arc<dyn RemoteCartStore>,
    ) -> Self {
        let dir = config.storage_dir();
        let storage: Arc<dyn KeyValueStorage> = match FileStorage::open(&dir) {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                warn!(
                    dir = %dir.display(),
                    error = %e,
                    "Device storage unavailable, cart will not survive restart"
                );
                Arc::new(MemoryStorage::new())
            }
        };

        Self::init_with_storage(config, storage, provider, remote).await
    }

    /// Builds the context over an explicit storage backend.
    pub async fn init_with_storage(
        config: &StorefrontConfig,
        storage: Arc<dyn KeyValueStorage>,
        provider: Arc<dyn CredentialProvider>,
        remote: Arc<dyn RemoteCartStore>,
    ) -> Self {
        let auth = Arc::new(AuthSession::start(provider, config.resolve_timeout()).await);

        let engine = Arc::new(CartSyncEngine::new(
            LocalCartStore::new(storage.clone()),
            remote,
            config.remote_policy(),
        ));
        let wishlist = WishlistStore::new(storage);

        let listener = spawn_auth_listener(engine.clone(), auth.clone()).await;

        info!(phase = ?engine.phase(), "Storefront context ready");

        StorefrontContext {
            engine,
            wishlist,
            auth,
            listener: Some(listener),
        }
    }

    pub fn cart(&self) -> &Arc<CartSyncEngine> {
        &self.engine
    }

    pub fn wishlist(&self) -> &WishlistStore {
        &self.wishlist
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    /// Stops reacting to auth changes. The engine keeps its last view.
    pub fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            info!("Storefront context shut down");
        }
    }
}

impl Drop for StorefrontContext {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for StorefrontContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontContext")
            .field("engine", &self.engine)
            .field("auth", &self.auth)
            .field("running", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

/// Installs a `tracing` subscriber for hosts that do not bring their own.
///
/// Honors `RUST_LOG`; defaults to `info,bazaar=debug,sqlx=warn`. Calling it
/// twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug,sqlx=warn")),
        )
        .try_init();
}
