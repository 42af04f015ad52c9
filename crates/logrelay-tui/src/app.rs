//! Application state management for logrelay.
//!
//! `App` plays the part of the browser page: it knows which page is
//! showing, whether content is still hidden behind the auth check, the
//! login form's contents, the log text, and the toasts on screen. Core
//! components talk to it only through `UiEvent`s.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use logrelay_core::{AuthController, Config, Destination, LogPoller, NoticeKind};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bridge::UiEvent;
use crate::services::Services;

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// How long a toast stays on screen
const TOAST_SECS: i64 = 5;

/// Toasts kept at once; older ones drop off
const MAX_TOASTS: usize = 3;

/// Number of lines to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: u16 = 10;

// ============================================================================
// UI State Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Email,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Email,
            LoginFocus::Button => LoginFocus::Password,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: NoticeKind,
    pub message: String,
    pub shown_at: DateTime<Utc>,
}

impl Toast {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.shown_at > Duration::seconds(TOAST_SECS)
    }
}

pub struct App {
    pub state: AppState,
    pub page: Destination,
    /// Content stays hidden until the auth check reveals it
    pub hidden: bool,

    // Login form
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    // Log display
    pub log_text: String,
    pub log_scroll: u16,
    pub follow_tail: bool,

    pub toasts: VecDeque<Toast>,
    pub server_url: String,

    config: Config,
    auth: AuthController,
    poller: LogPoller,
    events: mpsc::UnboundedReceiver<UiEvent>,
}

impl App {
    pub fn new(config: Config, services: Services, events: mpsc::UnboundedReceiver<UiEvent>) -> Self {
        Self {
            state: AppState::Normal,
            page: Destination::ViewLogs,
            hidden: true,
            login_email: config.last_email.clone().unwrap_or_default(),
            login_password: String::new(),
            login_focus: LoginFocus::Email,
            login_error: None,
            log_text: String::new(),
            log_scroll: 0,
            follow_tail: true,
            toasts: VecDeque::new(),
            server_url: config.server_url.clone(),
            config,
            auth: services.auth,
            poller: services.poller,
            events,
        }
    }

    /// First page load: start the poller and gate the log page.
    pub fn start(&mut self) {
        self.poller.start();
        self.page_load();
    }

    /// Run the auth check a page performs when it loads. The log page
    /// redirects unauthenticated users; the login page only reveals itself.
    pub fn page_load(&self) {
        let auth = self.auth.clone();
        let redirect = self.page == Destination::ViewLogs;
        tokio::spawn(async move {
            if let Err(e) = auth.check_auth(redirect).await {
                debug!(error = %e, redirect, "Page load auth check");
            }
        });
    }

    /// Drain events from background tasks and expire old toasts.
    pub fn check_background_tasks(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
        self.prune_toasts(Utc::now());
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Notice(kind, message) => self.push_toast(kind, message),
            UiEvent::Reveal => self.hidden = false,
            UiEvent::Navigate(destination) => self.navigate(destination),
            UiEvent::Log(text) => self.log_text = text,
        }
    }

    fn navigate(&mut self, destination: Destination) {
        if destination == self.page {
            return;
        }
        debug!(path = destination.path(), "Navigating");
        self.page = destination;
        match destination {
            Destination::ViewLogs => {
                // The server admitted the relayed token to get here
                self.hidden = false;
                self.login_password.clear();
                self.login_error = None;
            }
            Destination::Login => {
                self.hidden = true;
                self.login_focus = if self.login_email.is_empty() {
                    LoginFocus::Email
                } else {
                    LoginFocus::Password
                };
                self.page_load();
            }
        }
    }

    fn push_toast(&mut self, kind: NoticeKind, message: String) {
        self.toasts.push_back(Toast {
            kind,
            message,
            shown_at: Utc::now(),
        });
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    fn prune_toasts(&mut self, now: DateTime<Utc>) {
        self.toasts.retain(|toast| !toast.is_expired(now));
    }

    /// Submit the login form. Both fields are required.
    pub fn submit_login(&mut self) {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        if email.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return;
        }
        self.login_error = None;

        self.config.last_email = Some(email.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        let auth = self.auth.clone();
        tokio::spawn(async move {
            if let Err(e) = auth.sign_in(&email, &password).await {
                debug!(error = %e, "Sign-in finished without a session");
            }
        });
    }

    pub fn sign_out(&self) {
        let auth = self.auth.clone();
        tokio::spawn(async move {
            if let Err(e) = auth.sign_out().await {
                debug!(error = %e, "Sign-out did not complete");
            }
        });
    }

    pub fn shutdown(&self) {
        self.poller.stop();
        self.auth.shutdown();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        if self.follow_tail {
            self.log_scroll = self.max_scroll();
        }
        self.follow_tail = false;
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.log_scroll = self.log_scroll.saturating_add(lines).min(self.max_scroll());
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_tail = false;
        self.log_scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
        self.log_scroll = self.max_scroll();
    }

    pub fn log_line_count(&self) -> u16 {
        self.log_text.lines().count().min(u16::MAX as usize) as u16
    }

    fn max_scroll(&self) -> u16 {
        self.log_line_count().saturating_sub(1)
    }
}

/// Characters accepted by the form fields
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
