//! Periodic log refresh.
//!
//! Every tick reads the persisted token, then fires an independent
//! `GET /get_logs` carrying it as the raw `Authorization` value. Whatever
//! body comes back, whatever the status, replaces the displayed text.
//! Requests are not serialized: a slow response may land after a faster,
//! later one. Failed requests leave the display as it was.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Url};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::TokenStore;
use crate::view::ViewBinding;

/// Log text endpoint
pub const LOGS_PATH: &str = "/get_logs";

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

#[derive(Clone)]
pub struct LogPoller {
    client: Client,
    logs_url: Url,
    interval: Duration,
    store: Arc<dyn TokenStore>,
    view: Arc<dyn ViewBinding>,
    handle: Arc<Mutex<Option<PollHandle>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LogPoller {
    pub fn new(
        server: &Url,
        interval: Duration,
        store: Arc<dyn TokenStore>,
        view: Arc<dyn ViewBinding>,
    ) -> Result<Self> {
        // No request timeout: a hung request only stalls its own tick
        let client = Client::builder().build()?;
        let logs_url = server.join(LOGS_PATH).context("Failed to build get_logs URL")?;

        Ok(Self {
            client,
            logs_url,
            interval,
            store,
            view,
            handle: Arc::new(Mutex::new(None)),
        })
    }

    /// Start polling. Returns `false` when a loop is already running.
    pub fn start(&self) -> bool {
        let mut slot = lock(&self.handle);
        if slot.as_ref().is_some_and(PollHandle::is_running) {
            debug!("Log poller already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let poller = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { poller.run(token).await });

        info!(interval_ms = self.interval.as_millis() as u64, "Log poller started");
        *slot = Some(PollHandle { cancel, task });
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = lock(&self.handle).take() {
            handle.stop();
            info!("Log poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.handle).as_ref().is_some_and(PollHandle::is_running)
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires one full period after start
        ticker.reset();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.spawn_fetch(&cancel),
            }
        }
    }

    fn spawn_fetch(&self, cancel: &CancellationToken) {
        // Read at issue time, not completion time
        let token = match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                None
            }
        };

        let poller = self.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match poller.fetch(token.as_deref()).await {
                Ok(body) if !cancel.is_cancelled() => poller.view.render_log(&body),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Log fetch failed, keeping stale display"),
            }
        });
    }

    /// One `GET /get_logs`. The body is returned for any status.
    pub async fn fetch(&self, token: Option<&str>) -> Result<String> {
        let mut request = self.client.get(self.logs_url.clone());
        if let Some(token) = token {
            match header::HeaderValue::from_str(token) {
                Ok(value) => request = request.header(header::AUTHORIZATION, value),
                // Still poll; the server answers the unauthenticated request
                Err(_) => warn!("Persisted token is not a valid header value, sending without it"),
            }
        }

        let response = request.send().await.context("Failed to send log request")?;
        let status = response.status();
        let body = response.text().await.context("Failed to read log response")?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "Log endpoint returned an error page");
        }
        Ok(body)
    }
}
