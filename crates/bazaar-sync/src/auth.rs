//! # Auth Session
//!
//! Holds the current identity and announces every change to it.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CredentialProvider (external)                                          │
//! │       │  current_identity / sign_in / sign_up / sign_out               │
//! │       ▼                                                                 │
//! │  AuthSession ── identity: Option<Identity>                              │
//! │       │                                                                 │
//! │       │  set_identity(new)                                              │
//! │       │    new == held  → nothing                                       │
//! │       │    Some(id)     → SignedIn(id)                                  │
//! │       │    None         → SignedOut                                     │
//! │       ▼                                                                 │
//! │  broadcast::Sender<AuthEvent> ──► engine's auth listener                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! If the provider cannot answer at startup (error or timeout), the session
//! starts anonymous rather than blocking the storefront.

use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use bazaar_core::Identity;

use crate::error::AuthError;

const EVENT_CAPACITY: usize = 16;

/// External credential mechanics (sign-up/login/logout).
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The identity of a session that survived from a previous run, if any.
    async fn current_identity(&self) -> Result<Option<Identity>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// An authentication transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
}

impl AuthEvent {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthEvent::SignedIn(identity) => Some(identity),
            AuthEvent::SignedOut => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            AuthEvent::SignedIn(identity) => Some(identity),
            AuthEvent::SignedOut => None,
        }
    }
}

impl From<Option<Identity>> for AuthEvent {
    fn from(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => AuthEvent::SignedIn(identity),
            None => AuthEvent::SignedOut,
        }
    }
}

/// Receiver of [`AuthEvent`]s.
pub type AuthSubscription = broadcast::Receiver<AuthEvent>;

pub struct AuthSession {
    provider: Arc<dyn CredentialProvider>,
    identity: Mutex<Option<Identity>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthSession {
    /// Resolves the starting identity and returns the session.
    pub async fn start(provider: Arc<dyn CredentialProvider>, resolve_timeout: Duration) -> Self {
        let identity = match tokio::time::timeout(resolve_timeout, provider.current_identity()).await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(e)) => {
                warn!(error = %e, "Credential provider unavailable, starting anonymous");
                None
            }
            Err(_) => {
                warn!(
                    timeout = ?resolve_timeout,
                    "Credential provider did not answer, starting anonymous"
                );
                None
            }
        };

        match &identity {
            Some(id) => info!(identity = %id, "Session resolved as signed in"),
            None => info!("Session resolved as anonymous"),
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        AuthSession {
            provider,
            identity: Mutex::new(identity),
            events,
        }
    }

    fn identity(&self) -> MutexGuard<'_, Option<Identity>> {
        self.identity.lock().unwrap_or_else(|poisoned| {
            error!("Auth identity lock poisoned, keeping last identity");
            poisoned.into_inner()
        })
    }

    pub fn current(&self) -> Option<Identity> {
        self.identity().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.identity().is_some()
    }

    /// Subscribes to transitions that happen after this call.
    pub fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.provider.sign_in(email, password).await?;
        self.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.provider.sign_up(email, password).await?;
        self.set_identity(Some(identity.clone()));
        Ok(identity)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        self.set_identity(None);
        Ok(())
    }

    /// Records an identity change observed outside this session (token
    /// expiry, another window). Returns whether an event was published.
    pub fn set_identity(&self, identity: Option<Identity>) -> bool {
        let mut held = self.identity();
        if *held == identity {
            return false;
        }

        *held = identity.clone();
        let event = AuthEvent::from(identity);
        match &event {
            AuthEvent::SignedIn(id) => info!(identity = %id, "Signed in"),
            AuthEvent::SignedOut => info!("Signed out"),
        }

        // Sent under the lock so subscribers see events in state order.
        // No receivers is fine.
        let _ = self.events.send(event);
        true
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("identity", &*self.identity())
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}
