//! # Remote Cart Store
//!
//! The account-scoped cart, one row per (identity, product).
//!
//! ## Call Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartSyncEngine                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RemotePolicy::run(op, || store.upsert(..))                            │
//! │       │                                                                 │
//! │       ├── attempt ──► tokio::time::timeout(policy.timeout, call)        │
//! │       │                  Ok            → return                         │
//! │       │                  Rejected      → return (never retried)         │
//! │       │                  Unavailable / Timeout                          │
//! │       │                     │                                           │
//! │       │                     ▼                                           │
//! │       └── retries left? ── sleep(ExponentialBackoff) ──► attempt again  │
//! │                                                                         │
//! │  Retrying is safe: upsert replaces, remove and clear are idempotent,   │
//! │  read has no effect.                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use bazaar_core::{Cart, Identity, ProductId};
use bazaar_db::{Database, DbConfig};

use crate::error::{RemoteError, RemoteOp};

// =============================================================================
// Trait
// =============================================================================

/// Account-scoped cart backend.
///
/// Every call may fail with a transient error. None of them retries on its
/// own; that is [`RemotePolicy`]'s job.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// All lines for `identity`, joined with current product data.
    /// An identity without rows has an empty cart.
    async fn read(&self, identity: &Identity) -> Result<Cart, RemoteError>;

    /// Sets the row's quantity, creating the row if needed. Repeating the
    /// call with the same arguments leaves the same single row.
    async fn upsert(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), RemoteError>;

    /// Deletes the row if present.
    async fn remove(&self, identity: &Identity, product_id: &ProductId) -> Result<(), RemoteError>;

    /// Deletes every row for `identity`.
    async fn clear(&self, identity: &Identity) -> Result<(), RemoteError>;
}

// =============================================================================
// SQL Backend
// =============================================================================

/// [`RemoteCartStore`] over the `user_cart`/`products` tables.
#[derive(Debug, Clone)]
pub struct SqlCartStore {
    db: Database,
}

impl SqlCartStore {
    pub fn new(db: Database) -> Self {
        SqlCartStore { db }
    }

    /// Opens (and migrates) the database at `config`.
    pub async fn open(config: DbConfig) -> Result<Self, RemoteError> {
        let db = Database::new(config).await?;
        Ok(SqlCartStore { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl RemoteCartStore for SqlCartStore {
    async fn read(&self, identity: &Identity) -> Result<Cart, RemoteError> {
        let rows = self.db.carts().list_for_user(identity.as_str()).await?;
        let items = rows.into_iter().map(|row| row.into_line_item()).collect();
        Ok(Cart::from_items(items))
    }

    async fn upsert(
        &self,
        identity: &Identity,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), RemoteError> {
        self.db
            .carts()
            .upsert(identity.as_str(), product_id.as_str(), quantity)
            .await?;
        Ok(())
    }

    async fn remove(&self, identity: &Identity, product_id: &ProductId) -> Result<(), RemoteError> {
        self.db
            .carts()
            .remove(identity.as_str(), product_id.as_str())
            .await?;
        Ok(())
    }

    async fn clear(&self, identity: &Identity) -> Result<(), RemoteError> {
        self.db.carts().clear(identity.as_str()).await?;
        Ok(())
    }
}

// =============================================================================
// Timeout + Retry Policy
// =============================================================================

/// Timeout and retry settings applied to every remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePolicy {
    /// Upper bound on one attempt.
    pub timeout: Duration,

    /// Attempts after the first. Zero surfaces the first failure.
    pub max_retries: u32,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,
}

impl Default for RemotePolicy {
    fn default() -> Self {
        RemotePolicy {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RemotePolicy {
    /// A policy that gives up after the first failure.
    pub fn no_retry(timeout: Duration) -> Self {
        RemotePolicy {
            timeout,
            max_retries: 0,
            ..Default::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Runs `call` under the timeout, retrying retryable failures.
    pub async fn run<T, F, Fut>(&self, op: RemoteOp, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Timeout(self.timeout)),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                warn!(%op, attempt, error = %err, "Remote call failed");
                return Err(err);
            }

            attempt += 1;
            let Some(delay) = backoff.next_backoff() else {
                return Err(err);
            };
            debug!(%op, attempt, ?delay, error = %err, "Retrying remote call");
            tokio::time::sleep(delay).await;
        }
    }
}
