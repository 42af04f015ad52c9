//! Identity provider seam.
//!
//! The provider is consumed as four capabilities: credential sign-in,
//! sign-out, an auth-state stream, and ID-token retrieval. Everything the
//! provider does internally (token refresh, session persistence) stays
//! behind `IdentityGateway`.
//!
//! Auth-state subscriptions are explicit handles: a subscriber reads the
//! first resolved state and then drops or `unsubscribe`s the handle, so
//! repeated auth checks never pile up listeners.

pub mod error;
pub mod firebase;
pub mod session;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

pub use error::IdentityError;
pub use firebase::FirebaseGateway;
pub use session::{Session, SessionFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Provider is still restoring its persisted session
    Unresolved,
    SignedOut,
    SignedIn(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, AuthState::Unresolved)
    }
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn sign_in_with_credentials(&self, email: &str, password: &str)
        -> Result<(), IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Subscribe to auth-state changes.
    fn on_auth_state_changed(&self) -> AuthStateSubscription;

    /// Current ID token for `session`, re-issued by the provider when stale.
    async fn id_token(&self, session: &Session) -> Result<String, IdentityError>;
}

/// Broadcast side of the auth-state stream, shared by gateway
/// implementations.
#[derive(Debug)]
pub struct AuthStateChannel {
    tx: watch::Sender<AuthState>,
    listeners: Arc<AtomicUsize>,
}

impl AuthStateChannel {
    pub fn new(initial: AuthState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn publish(&self, state: AuthState) {
        // send_replace stores the value even with no live receivers
        self.tx.send_replace(state);
    }

    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> AuthStateSubscription {
        self.listeners.fetch_add(1, Ordering::SeqCst);
        AuthStateSubscription {
            rx: self.tx.subscribe(),
            listeners: Arc::clone(&self.listeners),
        }
    }

    /// Number of subscriptions that have not been torn down yet.
    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }
}

/// One listener on the auth-state stream. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthStateSubscription {
    rx: watch::Receiver<AuthState>,
    listeners: Arc<AtomicUsize>,
}

impl AuthStateSubscription {
    /// The first resolved state: the current one if the provider has
    /// already resolved, otherwise the next resolved emission. `None` when
    /// the provider went away before resolving.
    pub async fn first(&mut self) -> Option<AuthState> {
        self.rx
            .wait_for(AuthState::is_resolved)
            .await
            .ok()
            .map(|state| AuthState::clone(&state))
    }

    /// Explicit teardown.
    pub fn unsubscribe(self) {}
}

impl Drop for AuthStateSubscription {
    fn drop(&mut self) {
        self.listeners.fetch_sub(1, Ordering::SeqCst);
    }
}
