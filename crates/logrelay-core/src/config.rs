//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the log server address, the identity provider settings, the timing of
//! the sign-in/sign-out flow, and where the relayed token is stored.
//!
//! Configuration is stored at `~/.config/logrelay/config.json`. Environment
//! variables (usually from a `.env` file) override the API key, the auth
//! emulator host and the server address.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "logrelay";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default log server address (the Flask development server's port)
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

pub const ENV_SERVER_URL: &str = "LOGRELAY_SERVER_URL";
pub const ENV_FIREBASE_API_KEY: &str = "FIREBASE_API_KEY";
pub const ENV_FIREBASE_AUTH_EMULATOR_HOST: &str = "FIREBASE_AUTH_EMULATOR_HOST";

/// Base URL for Identity Toolkit (sign-in)
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";

/// Base URL for Secure Token (refresh)
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com";

/// Where the relayed ID token is persisted between poll ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    /// JSON key/value file in the cache directory
    #[default]
    File,
    /// OS keychain entry
    Keyring,
    /// Process memory only; nothing survives a restart
    Memory,
}

/// Delays and periods of the auth flow and the poller, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause between the sign-in success notice and the auth check
    pub sign_in_delay_ms: u64,
    /// Pause between the "signing out" notice and the provider call
    pub sign_out_delay_ms: u64,
    /// Pause before navigating an unauthenticated user to the login page
    pub redirect_delay_ms: u64,
    /// Log poll period
    pub poll_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sign_in_delay_ms: 2000,
            sign_out_delay_ms: 2000,
            redirect_delay_ms: 1500,
            poll_interval_ms: 500,
        }
    }
}

impl Timing {
    pub fn sign_in_delay(&self) -> Duration {
        Duration::from_millis(self.sign_in_delay_ms)
    }

    pub fn sign_out_delay(&self) -> Duration {
        Duration::from_millis(self.sign_out_delay_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FirebaseConfig {
    pub api_key: Option<String>,
    /// Auth emulator `host:port`; both services are then served from it
    pub emulator_host: Option<String>,
    /// Identity Toolkit base URL override
    pub identity_url: Option<String>,
    /// Secure Token base URL override
    pub token_url: Option<String>,
}

impl FirebaseConfig {
    /// Resolved (identity, token) base URLs. Explicit overrides win over
    /// the emulator, which wins over the public endpoints.
    pub fn endpoints(&self) -> (String, String) {
        let (identity, token) = match self.emulator_host.as_deref() {
            Some(host) => {
                let host = host.trim_end_matches('/');
                let root = if host.contains("://") {
                    host.to_string()
                } else {
                    format!("http://{}", host)
                };
                (
                    format!("{}/identitytoolkit.googleapis.com", root),
                    format!("{}/securetoken.googleapis.com", root),
                )
            }
            None => (IDENTITY_TOOLKIT_URL.to_string(), SECURE_TOKEN_URL.to_string()),
        };

        (
            self.identity_url.clone().unwrap_or(identity),
            self.token_url.clone().unwrap_or(token),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub firebase: FirebaseConfig,
    pub timing: Timing,
    pub token_store: TokenStoreKind,
    /// Remove the persisted token once the provider confirms sign-out
    pub clear_token_on_sign_out: bool,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            firebase: FirebaseConfig::default(),
            timing: Timing::default(),
            token_store: TokenStoreKind::default(),
            clear_token_on_sign_out: true,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_SERVER_URL) {
            self.server_url = url;
        }
        if let Some(key) = get(ENV_FIREBASE_API_KEY) {
            self.firebase.api_key = Some(key);
        }
        if let Some(host) = get(ENV_FIREBASE_AUTH_EMULATOR_HOST) {
            self.firebase.emulator_host = Some(host);
        }
    }

    /// Parse the configured server address.
    pub fn server(&self) -> Result<reqwest::Url> {
        reqwest::Url::parse(&self.server_url)
            .with_context(|| format!("Invalid server URL: {}", self.server_url))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
