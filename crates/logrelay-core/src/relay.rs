//! Token relay: persist the ID token locally, then submit it to the log
//! server's protected page as a form POST.
//!
//! The submission behaves like a browser form: redirects are followed and
//! the page the server lands on decides where the view goes. The log page
//! means the token was accepted; the login page or an error status means
//! it was not.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{error, info, warn};

use crate::storage::TokenStore;
use crate::view::{Destination, ViewBinding};

/// Form field carrying the token
pub const TOKEN_FIELD: &str = "id_token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Server served the log page; view navigated to it
    Admitted,
    /// Server answered with the login page or an error status
    Rejected(u16),
    /// The request never completed; the view stays where it is
    Unreachable,
    /// The token could not be written locally; nothing was submitted
    StorageFailed,
}

#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, token: &str) -> RelayOutcome;

    /// Forget the persisted token.
    fn clear(&self) -> Result<()>;
}

pub struct TokenRelay {
    client: Client,
    view_logs_url: Url,
    store: Arc<dyn TokenStore>,
    view: Arc<dyn ViewBinding>,
}

impl TokenRelay {
    pub fn new(server: &Url, store: Arc<dyn TokenStore>, view: Arc<dyn ViewBinding>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let view_logs_url = server
            .join(Destination::ViewLogs.path())
            .context("Failed to build view_logs URL")?;

        Ok(Self {
            client,
            view_logs_url,
            store,
            view,
        })
    }

    async fn submit(&self, token: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(self.view_logs_url.clone())
            .form(&[(TOKEN_FIELD, token)])
            .send()
            .await
    }
}

#[async_trait]
impl Relay for TokenRelay {
    async fn relay(&self, token: &str) -> RelayOutcome {
        if let Err(e) = self.store.save(token) {
            error!(error = %e, "Failed to persist ID token");
            return RelayOutcome::StorageFailed;
        }

        let response = match self.submit(token).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, url = %self.view_logs_url, "Token relay request failed");
                return RelayOutcome::Unreachable;
            }
        };

        let status = response.status();
        let landed_on_login = response.url().path() == Destination::Login.path();

        if status.is_success() && !landed_on_login {
            info!("Token accepted, opening log view");
            self.view.navigate(Destination::ViewLogs);
            RelayOutcome::Admitted
        } else {
            warn!(status = status.as_u16(), landed_on_login, "Token relay rejected");
            self.view.navigate(Destination::Login);
            RelayOutcome::Rejected(status.as_u16())
        }
    }

    fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}
