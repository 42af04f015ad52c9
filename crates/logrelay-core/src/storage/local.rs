use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TokenStore, TOKEN_KEY};

/// Storage file name in the cache directory
const STORAGE_FILE: &str = "local_storage.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredItem {
    pub value: String,
    pub stored_at: DateTime<Utc>,
}

impl StoredItem {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            stored_at: Utc::now(),
        }
    }
}

/// String key/value storage backed by one JSON file, with the same
/// contract as a browser's local storage: no expiry, last write wins.
pub struct LocalStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalStorage {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(STORAGE_FILE),
            lock: Mutex::new(()),
        })
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredItem>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read local storage file")?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse local storage file")
    }

    fn write_all(&self, items: &BTreeMap<String, StoredItem>) -> Result<()> {
        let contents = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, contents).context("Failed to write local storage file")
    }

    pub fn item(&self, key: &str) -> Result<Option<StoredItem>> {
        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("Local storage lock poisoned"))?;
        Ok(self.read_all()?.remove(key))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.item(key)?.map(|item| item.value))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("Local storage lock poisoned"))?;
        let mut items = self.read_all()?;
        items.insert(key.to_string(), StoredItem::new(value));
        self.write_all(&items)?;
        debug!(key = key, "Stored local item");
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("Local storage lock poisoned"))?;
        let mut items = self.read_all()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }
}

/// Token store over `LocalStorage`, keyed by `id_token`.
pub struct FileTokenStore {
    storage: LocalStorage,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        Ok(Self {
            storage: LocalStorage::new(dir)?,
        })
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        self.storage.get_item(TOKEN_KEY)
    }

    fn save(&self, token: &str) -> Result<()> {
        self.storage.set_item(TOKEN_KEY, token)
    }

    fn clear(&self) -> Result<()> {
        self.storage.remove_item(TOKEN_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_storage_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf()).unwrap();

        storage.set_item("theme", "dark").unwrap();
        storage.set_item(TOKEN_KEY, "abc").unwrap();
        storage.remove_item(TOKEN_KEY).unwrap();

        assert_eq!(storage.get_item("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_token_store_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.load().unwrap(), None);

        store.save("one").unwrap();
        store.save("two").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("two"));
        let item = store.storage.item(TOKEN_KEY).unwrap().unwrap();
        assert!(item.stored_at <= Utc::now());

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), "{not json").unwrap();
        let store = FileTokenStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.load().is_err());
    }
}
