//! Durable client-side key-value storage.
//!
//! The credential token lives under [`TOKEN_STORAGE_KEY`]. The file store keeps
//! a flat JSON object at `storage_path` with restricted permissions (0600).
//! Values are never logged.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gatehouse_common::GatehouseError;
use gatehouse_common::constants::TOKEN_STORAGE_KEY;
use parking_lot::Mutex;

/// String key-value storage that survives restarts
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, GatehouseError>;
    fn set(&self, key: &str, value: &str) -> Result<(), GatehouseError>;
    fn remove(&self, key: &str) -> Result<(), GatehouseError>;

    /// The stored credential token, if any
    fn token(&self) -> Result<Option<String>, GatehouseError> {
        self.get(TOKEN_STORAGE_KEY)
    }
}

/// JSON file backed store
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, GatehouseError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            GatehouseError::Storage(format!("read {}: {e}", self.path.display()))
        })?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            GatehouseError::Storage(format!("parse {}: {e}", self.path.display()))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), GatehouseError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                GatehouseError::Storage(format!("create {}: {e}", parent.display()))
            })?;
        }

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| GatehouseError::Storage(format!("serialize: {e}")))?;

        write_private(&self.path, contents.as_bytes())
            .map_err(|e| GatehouseError::Storage(format!("write {}: {e}", self.path.display())))
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, GatehouseError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatehouseError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)?;
        tracing::debug!(key = %key, path = %self.path.display(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GatehouseError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// In-memory store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, GatehouseError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GatehouseError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GatehouseError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("storage.json"));

        assert_eq!(store.token().unwrap(), None);

        store.set(TOKEN_STORAGE_KEY, "tok_abc").unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("tok_abc"));

        // A second handle on the same file sees the value.
        let reopened = FileStore::new(store.path());
        assert_eq!(reopened.get(TOKEN_STORAGE_KEY).unwrap().as_deref(), Some("tok_abc"));

        store.remove(TOKEN_STORAGE_KEY).unwrap();
        assert_eq!(reopened.token().unwrap(), None);
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));

        store.set("theme", "light").unwrap();
        store.set(TOKEN_STORAGE_KEY, "t1").unwrap();
        store.remove(TOKEN_STORAGE_KEY).unwrap();

        assert_eq!(store.get("theme").unwrap().as_deref(), Some("light"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("storage.json"));
        store.set(TOKEN_STORAGE_KEY, "secret").unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.token(), Err(GatehouseError::Storage(_))));
    }
}
