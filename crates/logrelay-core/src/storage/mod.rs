//! Client-local persistence for the relayed ID token.
//!
//! Exactly one token value exists at a time, stored under the fixed key
//! `id_token`. Writes overwrite, reads return the latest write. There is
//! no expiry: the server decides whether a token is still good.
//!
//! Backends:
//! - `FileTokenStore`: JSON key/value file, the local-storage equivalent
//! - `KeyringTokenStore`: OS keychain entry
//! - `MemoryTokenStore`: process memory only

pub mod keyring;
pub mod local;

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::config::TokenStoreKind;

pub use keyring::KeyringTokenStore;
pub use local::{FileTokenStore, LocalStorage, StoredItem};

/// Storage key of the relayed token
pub const TOKEN_KEY: &str = "id_token";

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().map_err(|_| poisoned())?.clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        *self.token.lock().map_err(|_| poisoned())? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().map_err(|_| poisoned())? = None;
        Ok(())
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("Token store lock poisoned")
}

/// Open the backend selected in the config.
pub fn open(kind: TokenStoreKind, cache_dir: &Path) -> Result<Arc<dyn TokenStore>> {
    Ok(match kind {
        TokenStoreKind::File => Arc::new(FileTokenStore::new(cache_dir.to_path_buf())?),
        TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new()),
        TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_open_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(TokenStoreKind::File, dir.path()).unwrap();
        store.save("tok").unwrap();

        let reopened = open(TokenStoreKind::File, dir.path()).unwrap();
        assert_eq!(reopened.load().unwrap().as_deref(), Some("tok"));
    }
}
