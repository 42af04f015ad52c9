use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, Timing};
use crate::identity::{AuthState, IdentityGateway};
use crate::notify::{NoticeKind, Notifier};
use crate::relay::{Relay, RelayOutcome};
use crate::view::{Destination, ViewBinding};

use super::error::AuthError;
use super::sequence::Sequence;

const MSG_SIGNED_IN: &str = "Signed in successfully";
const MSG_BAD_CREDENTIALS: &str = "Username or Password is incorrect";
const MSG_SIGNING_OUT: &str = "Signing out...";
const MSG_SIGNED_OUT: &str = "Signed out successfully";
const MSG_SIGN_OUT_FAILED: &str = "Error encountered while signing out";
const MSG_SERVER_UNREACHABLE: &str = "Could not reach the log server";

type CheckFuture = Shared<BoxFuture<'static, Result<String, AuthError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOptions {
    pub timing: Timing,
    pub clear_token_on_sign_out: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            clear_token_on_sign_out: true,
        }
    }
}

impl From<&Config> for AuthOptions {
    fn from(config: &Config) -> Self {
        Self {
            timing: config.timing,
            clear_token_on_sign_out: config.clear_token_on_sign_out,
        }
    }
}

/// Orchestrates sign-in, sign-out and the auth-state check.
///
/// Clones share state: one in-flight auth check, one pending redirect.
#[derive(Clone)]
pub struct AuthController {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<dyn IdentityGateway>,
    notifier: Arc<dyn Notifier>,
    view: Arc<dyn ViewBinding>,
    relay: Arc<dyn Relay>,
    options: AuthOptions,
    in_flight: Mutex<Option<CheckFuture>>,
    pending_redirect: Arc<Mutex<Option<CancellationToken>>>,
    shutdown: CancellationToken,
}

/// What one auth check needs. The in-flight future owns a `Resolver` and
/// never the controller's `Inner`.
struct Resolver {
    gateway: Arc<dyn IdentityGateway>,
    notifier: Arc<dyn Notifier>,
    view: Arc<dyn ViewBinding>,
    relay: Arc<dyn Relay>,
    pending_redirect: Arc<Mutex<Option<CancellationToken>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthController {
    pub fn new(
        gateway: Arc<dyn IdentityGateway>,
        notifier: Arc<dyn Notifier>,
        view: Arc<dyn ViewBinding>,
        relay: Arc<dyn Relay>,
        options: AuthOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                notifier,
                view,
                relay,
                options,
                in_flight: Mutex::new(None),
                pending_redirect: Arc::new(Mutex::new(None)),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    fn sequence(&self, name: &'static str) -> Sequence {
        Sequence::new(
            name,
            Arc::clone(&self.inner.notifier),
            self.inner.shutdown.child_token(),
        )
    }

    /// Sign in with email and password.
    ///
    /// On success the user is told, and after the sign-in delay the
    /// auth check runs with redirect enabled; its result is returned. On
    /// any provider failure a single generic error notice is shown and
    /// nothing else happens.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let seq = self.sequence("sign-in");
        seq.act("provider-sign-in")?;

        match self
            .inner
            .gateway
            .sign_in_with_credentials(email, password)
            .await
        {
            Ok(()) => {
                info!("Signed in");
                seq.notify(NoticeKind::Success, MSG_SIGNED_IN)?;
                seq.wait("notice-delay", self.inner.options.timing.sign_in_delay())
                    .await?;
                seq.act("check-auth")?;
                self.check_auth(true).await
            }
            Err(e) => {
                warn!(error = %e, "Sign-in rejected by provider");
                seq.notify(NoticeKind::Error, MSG_BAD_CREDENTIALS)?;
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Sign out: announce, wait, then ask the provider.
    ///
    /// After a confirmed sign-out the persisted token is cleared (unless
    /// disabled) and the auth check runs with redirect enabled, which sends
    /// the view back to the login page.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let seq = self.sequence("sign-out");
        seq.notify(NoticeKind::Info, MSG_SIGNING_OUT)?;
        seq.wait("notice-delay", self.inner.options.timing.sign_out_delay())
            .await?;
        seq.act("provider-sign-out")?;

        match self.inner.gateway.sign_out().await {
            Ok(()) => {
                info!("Signed out");
                seq.notify(NoticeKind::Success, MSG_SIGNED_OUT)?;
                if self.inner.options.clear_token_on_sign_out {
                    if let Err(e) = self.inner.relay.clear() {
                        warn!(error = %e, "Failed to clear persisted token");
                    }
                }
                match self.check_auth(true).await {
                    Ok(_) | Err(AuthError::NotSignedIn) => Ok(()),
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                warn!(error = %e, "Provider sign-out failed");
                seq.notify(NoticeKind::Error, MSG_SIGN_OUT_FAILED)?;
                Err(AuthError::SignOut(e.to_string()))
            }
        }
    }

    /// Gate on the current auth state.
    ///
    /// Signed in: the view is revealed, the ID token is relayed and
    /// returned, whatever `redirect` says. Signed out: `NotSignedIn`, plus
    /// a delayed navigation to the login page when `redirect` is set, or a
    /// reveal of the current page when it is not.
    ///
    /// Overlapping calls share one in-flight check.
    pub async fn check_auth(&self, redirect: bool) -> Result<String, AuthError> {
        let result = self.shared_check().await;

        if let Err(AuthError::NotSignedIn) = result {
            if redirect {
                self.schedule_redirect();
            } else {
                self.inner.view.reveal();
            }
        }
        result
    }

    /// Cancel every pending timed step and redirect.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn has_pending_redirect(&self) -> bool {
        lock(&self.inner.pending_redirect)
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    fn shared_check(&self) -> CheckFuture {
        let mut slot = lock(&self.inner.in_flight);
        if let Some(existing) = slot.as_ref() {
            if existing.peek().is_none() {
                debug!("Joining in-flight auth check");
                return existing.clone();
            }
        }

        let resolver = Resolver {
            gateway: Arc::clone(&self.inner.gateway),
            notifier: Arc::clone(&self.inner.notifier),
            view: Arc::clone(&self.inner.view),
            relay: Arc::clone(&self.inner.relay),
            pending_redirect: Arc::clone(&self.inner.pending_redirect),
        };
        let check = async move { resolver.resolve().await }.boxed().shared();
        *slot = Some(check.clone());
        check
    }

    fn schedule_redirect(&self) {
        let token = self.inner.shutdown.child_token();
        if let Some(previous) = lock(&self.inner.pending_redirect).replace(token.clone()) {
            previous.cancel();
        }

        let seq = Sequence::new("redirect", Arc::clone(&self.inner.notifier), token.clone());
        let view = Arc::clone(&self.inner.view);
        let delay = self.inner.options.timing.redirect_delay();

        tokio::spawn(async move {
            if seq.wait("redirect-delay", delay).await.is_ok() && seq.act("navigate").is_ok() {
                info!("Not signed in, going to login page");
                view.navigate(Destination::Login);
            }
            token.cancel();
        });
    }
}

impl Resolver {
    async fn resolve(&self) -> Result<String, AuthError> {
        let mut subscription = self.gateway.on_auth_state_changed();
        let state = subscription.first().await;
        subscription.unsubscribe();

        let session = match state {
            Some(AuthState::SignedIn(session)) => session,
            _ => {
                debug!("Auth check: no session");
                return Err(AuthError::NotSignedIn);
            }
        };

        // A session wins over a redirect scheduled by an earlier check
        if let Some(pending) = lock(&self.pending_redirect).take() {
            pending.cancel();
        }

        self.view.reveal();

        let token = self.gateway.id_token(&session).await.map_err(|e| {
            warn!(error = %e, "Failed to obtain ID token");
            AuthError::Token(e.to_string())
        })?;

        let outcome = self.relay.relay(&token).await;
        debug!(?outcome, "Token relayed");
        if outcome == RelayOutcome::Unreachable {
            self.notifier.notify(NoticeKind::Warning, MSG_SERVER_UNREACHABLE);
        }
        Ok(token)
    }
}
