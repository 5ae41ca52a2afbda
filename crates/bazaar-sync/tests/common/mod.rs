//! Shared fakes for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, Notify};

use bazaar_core::{Cart, Identity, LineItem, Money, ProductId, ProductSnapshot};
use bazaar_sync::{
    AuthError, CartSyncEngine, CredentialProvider, LocalCartStore, MemoryStorage, RemoteCartStore,
    RemoteError, RemotePolicy,
};

// =============================================================================
// Catalog
// =============================================================================

pub fn tee() -> ProductSnapshot {
    ProductSnapshot::new("tee", "Logo Tee", Money::from_cents(2500))
}

pub fn sock() -> ProductSnapshot {
    ProductSnapshot::new("sock", "Crew Sock", Money::from_cents(800))
}

pub fn runner() -> ProductSnapshot {
    ProductSnapshot::new("runner", "Trail Runner", Money::from_cents(9000))
        .with_discount(Money::from_cents(7200))
}

pub fn user(id: &str) -> Identity {
    Identity::new(id).unwrap()
}

pub fn pid(id: &str) -> ProductId {
    ProductId::new(id)
}

// =============================================================================
// Remote
// =============================================================================

/// In-memory remote cart with failure injection.
///
/// Rows keep insertion order per identity, like the SQL backend's
/// `ORDER BY created_at`.
#[derive(Default)]
pub struct FakeRemote {
    catalog: Mutex<HashMap<ProductId, ProductSnapshot>>,
    rows: Mutex<HashMap<Identity, Vec<(ProductId, i64)>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
    upsert_gate: AsyncMutex<()>,
    upsert_started: Notify,
}

impl FakeRemote {
    pub fn with_catalog(products: &[ProductSnapshot]) -> Arc<Self> {
        let remote = FakeRemote::default();
        {
            let mut catalog = remote.catalog.lock().unwrap();
            for product in products {
                catalog.insert(product.id.clone(), product.clone());
            }
        }
        Arc::new(remote)
    }

    pub fn seed_row(&self, identity: &Identity, product_id: &ProductId, quantity: i64) {
        let mut rows = self.rows.lock().unwrap();
        let lines = rows.entry(identity.clone()).or_default();
        match lines.iter_mut().find(|(id, _)| id == product_id) {
            Some(line) => line.1 = quantity,
            None => lines.push((product_id.clone(), quantity)),
        }
    }

    pub fn rows(&self, identity: &Identity) -> Vec<(ProductId, i64)> {
        self.rows
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Blocks every upsert until the guard is dropped.
    pub async fn hold_upserts(&self) -> AsyncMutexGuard<'_, ()> {
        self.upsert_gate.lock().await
    }

    /// Resolves once an upsert has reached the backend.
    pub async fn upsert_started(&self) {
        self.upsert_started.notified().await
    }

    fn check_writable(&self) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("503 Service Unavailable".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RemoteCartStore for FakeRemote {
    async fn read(&self, identity: &Identity) -> Result<Cart, RemoteError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("connection reset".into()));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);

        let catalog = self.catalog.lock().unwrap();
        let items = self
            .rows(identity)
            .into_iter()
            .filter_map(|(id, quantity)| {
                catalog
                    .get(&id)
                    .map(|product| LineItem::new(product.clone(), quantity))
            })
            .collect();
        Ok(Cart::from_items(items))
    }

    async fn upsert(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), RemoteError> {
        self.upsert_started.notify_one();
        let _gate = self.upsert_gate.lock().await;

        if quantity <= 0 {
            return Err(RemoteError::Rejected("quantity must be positive".into()));
        }
        if !self.catalog.lock().unwrap().contains_key(product_id) {
            return Err(RemoteError::Rejected("FOREIGN KEY constraint failed".into()));
        }
        self.check_writable()?;
        self.seed_row(identity, product_id, quantity);
        Ok(())
    }

    async fn remove(&self, identity: &Identity, product_id: &ProductId) -> Result<(), RemoteError> {
        self.check_writable()?;
        if let Some(lines) = self.rows.lock().unwrap().get_mut(identity) {
            lines.retain(|(id, _)| id != product_id);
        }
        Ok(())
    }

    async fn clear(&self, identity: &Identity) -> Result<(), RemoteError> {
        self.check_writable()?;
        self.rows.lock().unwrap().remove(identity);
        Ok(())
    }
}

// =============================================================================
// Credential Provider
// =============================================================================

pub struct FakeProvider {
    current: Mutex<Result<Option<Identity>, AuthError>>,
    hang: bool,
}

impl FakeProvider {
    pub fn signed_in(identity: Identity) -> Arc<Self> {
        Arc::new(FakeProvider {
            current: Mutex::new(Ok(Some(identity))),
            hang: false,
        })
    }

    pub fn anonymous() -> Arc<Self> {
        Arc::new(FakeProvider {
            current: Mutex::new(Ok(None)),
            hang: false,
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(FakeProvider {
            current: Mutex::new(Err(AuthError::Unavailable("dns lookup failed".into()))),
            hang: false,
        })
    }

    /// Never answers `current_identity`.
    pub fn hanging() -> Arc<Self> {
        Arc::new(FakeProvider {
            current: Mutex::new(Ok(None)),
            hang: true,
        })
    }
}

#[async_trait]
impl CredentialProvider for FakeProvider {
    async fn current_identity(&self) -> Result<Option<Identity>, AuthError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.current.lock().unwrap().clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if password != "secret" {
            return Err(AuthError::InvalidCredentials);
        }
        let identity = Identity::new(format!("user:{email}")).unwrap();
        *self.current.lock().unwrap() = Ok(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.current.lock().unwrap() = Ok(None);
        Ok(())
    }
}

// =============================================================================
// Engine Harness
// =============================================================================

pub struct Harness {
    pub storage: Arc<MemoryStorage>,
    pub local: LocalCartStore,
    pub remote: Arc<FakeRemote>,
    pub engine: Arc<CartSyncEngine>,
}

pub fn policy() -> RemotePolicy {
    RemotePolicy::no_retry(Duration::from_secs(5))
}

pub fn harness() -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let local = LocalCartStore::new(storage.clone());
    let remote = FakeRemote::with_catalog(&[tee(), sock(), runner()]);
    let engine = Arc::new(CartSyncEngine::new(local.clone(), remote.clone(), policy()));
    Harness {
        storage,
        local,
        remote,
        engine,
    }
}

/// Asserts the view's count agrees with its lines and that no line is
/// non-positive.
pub fn assert_view_consistent(engine: &CartSyncEngine) {
    let view = engine.view();
    let sum: i64 = view.cart.items().iter().map(|line| line.quantity).sum();
    assert_eq!(engine.cart_count(), sum);
    assert_eq!(view.count(), sum);
    assert!(view.cart.items().iter().all(|line| line.quantity > 0));
}
