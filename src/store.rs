//! Local key-value storage and the transaction-hash cache built on it.
//!
//! SYSTEM CONTEXT
//! ==============
//! The contract exposes no purchase history, so the client remembers which
//! transaction sold each listing. That memory is advisory: it only feeds
//! explorer links, and every failure here degrades to "no link" instead of
//! an error. The store is injected so tests and alternative front-ends can
//! swap the file for memory.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use abi::TxHash;
use tracing::{debug, warn};

/// Key under which the hash map is stored.
pub const TX_HASH_KEY: &str = "product_transaction_hashes";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed for {path}: {message}")]
    Io { path: String, message: String },
    #[error("store data corrupt: {0}")]
    Corrupt(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// String key-value storage with browser-`localStorage` semantics.
pub trait KvStore: Send + Sync {
    /// Read `key`, returning `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key` if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// All keys in one JSON object on disk. Writes go through a temp file and a
/// rename. Concurrent processes are not coordinated; last writer wins.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    fn io_error(&self, err: &std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.display().to_string(), message: err.to_string() }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(&e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(&e))?;
        }
        let rendered = serde_json::to_string_pretty(entries).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, rendered).map_err(|e| self.io_error(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(&e))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_all()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

// =============================================================================
// TRANSACTION HASH CACHE
// =============================================================================

/// Listing id → last known transaction hash, persisted as one JSON object
/// under [`TX_HASH_KEY`].
#[derive(Clone)]
pub struct TxHashCache {
    store: Arc<dyn KvStore>,
}

impl TxHashCache {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// In-memory cache, mostly for tests and one-shot commands.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Every readable entry. Read failures are logged and treated as an
    /// empty cache.
    #[must_use]
    pub fn all(&self) -> BTreeMap<u64, TxHash> {
        self.load().unwrap_or_else(|e| {
            warn!(error = %e, "tx hash cache read failed");
            BTreeMap::new()
        })
    }

    /// Remember `hash` for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] so callers can log it; a failed write never
    /// affects the transaction itself.
    pub fn record(&self, id: u64, hash: TxHash) -> Result<(), StoreError> {
        let mut raw = self.load_raw()?;
        raw.insert(id.to_string(), format!("{hash:#x}"));
        let rendered = serde_json::to_string(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.store.set(TX_HASH_KEY, &rendered)?;
        debug!(listing_id = id, ?hash, "tx hash recorded");
        Ok(())
    }

    fn load_raw(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match self.store.get(TX_HASH_KEY)? {
            None => Ok(BTreeMap::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string())),
        }
    }

    fn load(&self) -> Result<BTreeMap<u64, TxHash>, StoreError> {
        let raw = self.load_raw()?;
        Ok(raw
            .into_iter()
            .filter_map(|(id, hash)| Some((id.parse::<u64>().ok()?, hash.parse::<TxHash>().ok()?)))
            .collect())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
