//! Client-readable persistent storage for VULN-mode credentials.
//!
//! Storage is an injected capability instead of an ambient global, so the
//! rule "SECURE mode never touches it" can be checked by handing
//! [`CredentialChannel`](crate::CredentialChannel) a store that records or
//! rejects writes.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::{Error, Secret};

/// Key-value storage readable by client code.
///
/// Implementations hold plain strings; values are wrapped in [`Secret`] on the
/// way out so callers cannot log them by accident.
pub trait CredentialStore: Send + Sync {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Secret<String>>, Error>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &Secret<String>) -> Result<(), Error>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Volatile store that counts every mutation.
///
/// # Examples
///
/// ```
/// use posture_core::{CredentialStore, MemoryStore, Secret};
///
/// let store = MemoryStore::new();
/// store.set("accessToken", &Secret::new("t".to_string())).unwrap();
///
/// assert_eq!(store.len(), 1);
/// assert_eq!(store.write_count(), 1);
/// ```
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns how many `set` and `remove` calls reached this store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Acquire)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.entries.lock().keys().collect::<Vec<_>>())
            .field("writes", &self.write_count())
            .finish()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Secret<String>>, Error> {
        Ok(self.entries.lock().get(key).cloned().map(Secret::new))
    }

    fn set(&self, key: &str, value: &Secret<String>) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.entries
            .lock()
            .insert(key.to_string(), value.expose_secret().clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store persisted as a JSON object on disk, surviving process restarts.
///
/// The file is re-read on every access so several processes pointed at the
/// same path observe each other's writes, the way browser tabs share storage.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, Error> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| Error::Storage(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<(), Error> {
        let raw =
            serde_json::to_string_pretty(entries).map_err(|e| Error::Storage(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| Error::Storage(e.to_string()))
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Secret<String>>, Error> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key).map(Secret::new))
    }

    fn set(&self, key: &str, value: &Secret<String>) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.expose_secret().clone());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}
