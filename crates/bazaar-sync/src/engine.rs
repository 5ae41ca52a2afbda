//! # Cart Sync Engine
//!
//! Decides which backend is authoritative, reloads the cart when the
//! identity changes, and applies cart mutations against the authoritative
//! backend.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │                       ┌─────────────┐                                  │
//! │          start ──────►│  Resolving  │◄──────── signed in (any state)    │
//! │                       └──────┬──────┘          loading = true           │
//! │               no identity    │    identity                              │
//! │            ┌─────────────────┴──────────────────┐                      │
//! │            ▼                                    ▼                       │
//! │   ┌─────────────────┐   signed in      ┌──────────────────────┐        │
//! │   │   Anonymous     │ ───────────────► │ Authenticated(id)    │        │
//! │   │ backend = Local │ ◄─────────────── │ backend = Remote(id) │        │
//! │   └─────────────────┘   signed out     └──────────────────────┘        │
//! │                                                                         │
//! │   Entering Anonymous:      view := LocalCartStore.read()               │
//! │   Entering Authenticated:  view := RemoteCartStore.read(id)            │
//! │                            (the device cart is neither merged nor      │
//! │                             cleared, it simply stops being shown)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Mutation Paths
//! ```text
//! Anonymous (optimistic)                 Authenticated (confirmed)
//! ──────────────────────                 ─────────────────────────
//! 1. apply to a copy of view.cart        1. upsert / remove / clear
//! 2. LocalCartStore.write(copy)          2. wait for the backend
//! 3. publish copy                        3. view := read(id)
//!                                        on failure: view untouched
//! ```
//!
//! ## Ordering
//! Every operation, auth transitions included, runs under one FIFO async
//! lock, so at most one backend request per engine is in flight. The lock
//! guards the generation whose backend the view currently shows. A
//! transition bumps the engine generation *before* queueing, so an
//! operation that finishes while a transition waits behind it sees a
//! mismatch and does not publish; the transition's own reload follows.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bazaar_core::{
    Cart, CartTotals, CoreError, Identity, ProductId, ProductSnapshot, MAX_ITEM_QUANTITY,
};

use crate::auth::{AuthEvent, AuthSession, AuthSubscription};
use crate::error::{CartError, CartFailure, CartResult, RemoteError, RemoteOp};
use crate::local_cart::LocalCartStore;
use crate::remote::{RemoteCartStore, RemotePolicy};

// =============================================================================
// Published State
// =============================================================================

/// Which backend is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum SyncPhase {
    /// Identity not known yet. No backend is authoritative.
    Resolving,
    /// Device storage is authoritative.
    Anonymous,
    /// The remote cart of this identity is authoritative.
    Authenticated(Identity),
}

impl SyncPhase {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SyncPhase::Authenticated(identity) => Some(identity),
            SyncPhase::Resolving | SyncPhase::Anonymous => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, SyncPhase::Resolving)
    }
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub phase: SyncPhase,

    /// Always the content of exactly one backend: the one `phase` names.
    pub cart: Cart,

    /// A backend read is in flight.
    pub loading: bool,

    /// Set when the last read failed; cleared by the next good read.
    pub last_error: Option<CartFailure>,
}

impl CartView {
    fn resolving() -> Self {
        CartView {
            phase: SyncPhase::Resolving,
            cart: Cart::new(),
            loading: true,
            last_error: None,
        }
    }

    /// The cart badge number.
    pub fn count(&self) -> i64 {
        self.cart.count()
    }

    pub fn totals(&self) -> CartTotals {
        self.cart.totals()
    }
}

// =============================================================================
// Engine
// =============================================================================

pub struct CartSyncEngine {
    local: LocalCartStore,
    remote: Arc<dyn RemoteCartStore>,
    policy: RemotePolicy,
    view_tx: watch::Sender<CartView>,
    /// Serializes operations. Holds the generation shown by the view.
    op_lock: Mutex<u64>,
    /// Bumped once per requested transition.
    generation: AtomicU64,
}

impl CartSyncEngine {
    /// Creates an engine in `Resolving`. Nothing is read until
    /// [`resolve`](Self::resolve) is called.
    pub fn new(local: LocalCartStore, remote: Arc<dyn RemoteCartStore>, policy: RemotePolicy) -> Self {
        let (view_tx, _) = watch::channel(CartView::resolving());
        CartSyncEngine {
            local,
            remote,
            policy,
            view_tx,
            op_lock: Mutex::new(0),
            generation: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Current view. Never waits on I/O.
    pub fn view(&self) -> CartView {
        self.view_tx.borrow().clone()
    }

    /// Receiver that is notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<CartView> {
        self.view_tx.subscribe()
    }

    /// Sum of quantities in the current view.
    pub fn cart_count(&self) -> i64 {
        self.view_tx.borrow().count()
    }

    pub fn phase(&self) -> SyncPhase {
        self.view_tx.borrow().phase.clone()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Makes the backend for `identity` authoritative and loads its cart.
    ///
    /// Returns `Ok(())` without publishing if a newer transition was
    /// requested while this one waited or read.
    pub async fn resolve(&self, identity: Option<Identity>) -> CartResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut shown = self.op_lock.lock().await;

        if !self.is_current(generation) {
            debug!(generation, "Transition superseded before it started");
            return Ok(());
        }
        *shown = generation;

        let Some(identity) = identity else {
            let cart = self.local.read();
            info!(generation, lines = cart.line_count(), "Cart backend: device");
            self.publish_if_current(generation, |view| {
                view.phase = SyncPhase::Anonymous;
                view.cart = cart;
                view.loading = false;
                view.last_error = None;
            });
            return Ok(());
        };

        // Same backend as shown: refresh in place, the cart stays visible.
        if self.view_tx.borrow().phase.identity() == Some(&identity) {
            debug!(generation, identity = %identity, "Identity unchanged, refreshing");
            return self.refresh_remote(generation, &identity).await;
        }

        // Nothing from the previous backend may stay visible while the
        // remote cart loads.
        self.publish_if_current(generation, |view| {
            view.phase = SyncPhase::Resolving;
            view.cart = Cart::new();
            view.loading = true;
            view.last_error = None;
        });

        let result = self
            .policy
            .run(RemoteOp::Read, || self.remote.read(&identity))
            .await;

        match result {
            Ok(cart) => {
                info!(generation, identity = %identity, lines = cart.line_count(), "Cart backend: remote");
                self.publish_if_current(generation, |view| {
                    view.phase = SyncPhase::Authenticated(identity);
                    view.cart = cart;
                    view.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                warn!(generation, identity = %identity, error = %e, "Remote cart could not be loaded");
                self.publish_if_current(generation, |view| {
                    view.phase = SyncPhase::Authenticated(identity);
                    view.cart = Cart::new();
                    view.loading = false;
                    view.last_error = Some(CartFailure::LoadFailed);
                });
                Err(CartError::remote(RemoteOp::Read, e))
            }
        }
    }

    pub async fn apply_auth_event(&self, event: AuthEvent) -> CartResult<()> {
        self.resolve(event.into_identity()).await
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds one unit of `product`.
    pub async fn add(&self, product: ProductSnapshot) -> CartResult<()> {
        let shown = self.op_lock.lock().await;
        let generation = *shown;
        let view = self.view();
        debug!(product_id = %product.id, generation, "add");

        match view.phase {
            SyncPhase::Resolving => Err(CartError::NotReady),
            SyncPhase::Anonymous => {
                let mut cart = view.cart;
                cart.add_product(&product)?;
                self.commit_local(generation, cart);
                Ok(())
            }
            SyncPhase::Authenticated(identity) => {
                let base = self.remote_base(generation, &identity, view.cart, view.last_error).await?;
                let quantity = base.quantity_after_add(&product.id)?;
                self.remote_mutation(generation, &identity, RemoteOp::Upsert, || {
                    self.remote.upsert(&identity, &product.id, quantity)
                })
                .await
            }
        }
    }

    /// Replaces a line's quantity. `quantity <= 0` removes the line.
    ///
    /// A product that is not in the cart is left alone. When signed in, the
    /// remote cart is re-read before concluding the product is absent.
    pub async fn set_quantity(&self, product_id: ProductId, quantity: i64) -> CartResult<()> {
        let shown = self.op_lock.lock().await;
        let generation = *shown;
        let view = self.view();
        debug!(product_id = %product_id, quantity, generation, "set_quantity");

        match view.phase {
            SyncPhase::Resolving => Err(CartError::NotReady),
            SyncPhase::Anonymous => {
                let mut cart = view.cart;
                if cart.set_quantity(&product_id, quantity)? {
                    self.commit_local(generation, cart);
                }
                Ok(())
            }
            SyncPhase::Authenticated(identity) => {
                if quantity > MAX_ITEM_QUANTITY {
                    return Err(CoreError::QuantityTooLarge {
                        requested: quantity,
                        max: MAX_ITEM_QUANTITY,
                    }
                    .into());
                }
                let mut base = self.remote_base(generation, &identity, view.cart, view.last_error).await?;
                if !base.contains(&product_id) {
                    // Another device may have added it since the last read.
                    self.refresh_remote(generation, &identity).await?;
                    base = self.view().cart;
                }
                if !base.set_quantity(&product_id, quantity)? {
                    return Ok(());
                }

                if quantity <= 0 {
                    self.remote_mutation(generation, &identity, RemoteOp::Remove, || {
                        self.remote.remove(&identity, &product_id)
                    })
                    .await
                } else {
                    self.remote_mutation(generation, &identity, RemoteOp::Upsert, || {
                        self.remote.upsert(&identity, &product_id, quantity)
                    })
                    .await
                }
            }
        }
    }

    pub async fn remove(&self, product_id: ProductId) -> CartResult<()> {
        let shown = self.op_lock.lock().await;
        let generation = *shown;
        let view = self.view();
        debug!(product_id = %product_id, generation, "remove");

        match view.phase {
            SyncPhase::Resolving => Err(CartError::NotReady),
            SyncPhase::Anonymous => {
                let mut cart = view.cart;
                if cart.remove(&product_id) {
                    self.commit_local(generation, cart);
                }
                Ok(())
            }
            // The row may exist even if this view has not seen it yet.
            SyncPhase::Authenticated(identity) => {
                self.remote_mutation(generation, &identity, RemoteOp::Remove, || {
                    self.remote.remove(&identity, &product_id)
                })
                .await
            }
        }
    }

    pub async fn clear(&self) -> CartResult<()> {
        let shown = self.op_lock.lock().await;
        let generation = *shown;
        let view = self.view();
        debug!(generation, "clear");

        match view.phase {
            SyncPhase::Resolving => Err(CartError::NotReady),
            SyncPhase::Anonymous => {
                self.local.clear();
                self.publish_if_current(generation, |view| view.cart = Cart::new());
                Ok(())
            }
            SyncPhase::Authenticated(identity) => {
                self.remote_mutation(generation, &identity, RemoteOp::Clear, || {
                    self.remote.clear(&identity)
                })
                .await
            }
        }
    }

    /// Re-reads the authoritative backend.
    pub async fn reload(&self) -> CartResult<()> {
        let shown = self.op_lock.lock().await;
        let generation = *shown;
        let view = self.view();
        debug!(generation, "reload");

        match view.phase {
            SyncPhase::Resolving => Err(CartError::NotReady),
            SyncPhase::Anonymous => {
                let cart = self.local.read();
                self.publish_if_current(generation, |view| {
                    view.cart = cart;
                    view.last_error = None;
                });
                Ok(())
            }
            SyncPhase::Authenticated(identity) => self.refresh_remote(generation, &identity).await,
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Applies `update` unless a transition has been requested since
    /// `generation` was shown. Returns whether it was applied.
    fn publish_if_current(&self, generation: u64, update: impl FnOnce(&mut CartView)) -> bool {
        if !self.is_current(generation) {
            debug!(generation, "Discarding stale view update");
            return false;
        }
        self.view_tx.send_modify(update);
        true
    }

    fn commit_local(&self, generation: u64, cart: Cart) {
        self.local.write(&cart);
        self.publish_if_current(generation, |view| view.cart = cart);
    }

    /// The cart to compute a remote mutation from. After a failed load the
    /// view is empty and says nothing about the remote rows, so it is
    /// re-read first.
    async fn remote_base(
        &self,
        generation: u64,
        identity: &Identity,
        cart: Cart,
        last_error: Option<CartFailure>,
    ) -> CartResult<Cart> {
        if last_error.is_none() {
            return Ok(cart);
        }
        self.refresh_remote(generation, identity).await?;
        Ok(self.view().cart)
    }

    async fn refresh_remote(&self, generation: u64, identity: &Identity) -> CartResult<()> {
        self.publish_if_current(generation, |view| view.loading = true);

        let result = self
            .policy
            .run(RemoteOp::Read, || self.remote.read(identity))
            .await;

        match result {
            Ok(cart) => {
                self.publish_if_current(generation, |view| {
                    view.cart = cart;
                    view.loading = false;
                    view.last_error = None;
                });
                Ok(())
            }
            Err(e) => {
                self.publish_if_current(generation, |view| {
                    view.loading = false;
                    view.last_error = Some(CartFailure::LoadFailed);
                });
                Err(CartError::remote(RemoteOp::Read, e))
            }
        }
    }

    /// Runs a remote write, then refreshes the view from a full read.
    /// A failed write publishes nothing.
    async fn remote_mutation<F, Fut>(
        &self,
        generation: u64,
        identity: &Identity,
        op: RemoteOp,
        call: F,
    ) -> CartResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), RemoteError>>,
    {
        self.policy
            .run(op, call)
            .await
            .map_err(|e| CartError::remote(op, e))?;

        if !self.is_current(generation) {
            debug!(%op, generation, "Backend changed while writing, skipping refresh");
            return Ok(());
        }
        self.refresh_remote(generation, identity).await
    }
}

impl std::fmt::Debug for CartSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSyncEngine")
            .field("view", &*self.view_tx.borrow())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Auth Listener
// =============================================================================

/// Subscribes to `auth`, resolves the identity it currently holds, then
/// spawns a task that applies every later transition.
///
/// Returns once the initial resolve has settled, so the view is out of
/// `Resolving` by the time the caller gets the handle.
pub async fn spawn_auth_listener(engine: Arc<CartSyncEngine>, auth: Arc<AuthSession>) -> JoinHandle<()> {
    // Subscribe before resolving so no transition falls in between.
    let events = auth.subscribe();
    if let Err(e) = engine.resolve(auth.current()).await {
        warn!(error = %e, "Initial cart load failed");
    }
    tokio::spawn(run_auth_listener(engine, auth, events))
}

/// Applies events from `events` until the session is dropped.
///
/// If the receiver falls behind, the skipped events are replaced by one
/// resolve of the session's current identity.
pub async fn run_auth_listener(
    engine: Arc<CartSyncEngine>,
    auth: Arc<AuthSession>,
    mut events: AuthSubscription,
) {
    loop {
        let result = match events.recv().await {
            Ok(event) => engine.apply_auth_event(event).await,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Auth listener lagged, re-resolving");
                engine.resolve(auth.current()).await
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if let Err(e) = result {
            warn!(error = %e, "Cart reload after auth change failed");
        }
    }
    debug!("Auth listener stopped");
}
