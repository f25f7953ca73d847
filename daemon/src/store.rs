//! Persistent key-value storage for the token and reminders.
//!
//! Two entries are kept under fixed keys: [`TOKEN_KEY`] holds the opaque
//! bearer token and [`REMINDERS_KEY`] holds the JSON-serialized reminder
//! collection. Every [`KeyValueStore::set`] replaces the whole value, so a
//! reader never observes a partially written collection.
//!
//! - [`FileStore`]: one file per key, replaced via a uniquely named temp file
//!   and rename, so concurrent writers (even across processes) never share a
//!   partially written file
//! - [`MemoryStore`]: process-local map, used by tests and embedding hosts
//! - [`ReminderStore`]: typed access on top of either backend
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use nudge_daemon::store::{MemoryStore, ReminderStore};
//!
//! let store = ReminderStore::new(Arc::new(MemoryStore::new()));
//! assert!(store.reminders().unwrap().is_empty());
//! assert!(store.token().unwrap().is_none());
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tempfile::Builder;
use thiserror::Error;
use tracing::debug;

use crate::types::Reminder;

/// Key of the stored bearer token.
pub const TOKEN_KEY: &str = "token";

/// Key of the stored reminder collection.
pub const REMINDERS_KEY: &str = "reminders";

/// Errors that can occur while reading or writing the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error on the backing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored value could not be decoded.
    #[error("corrupt value for key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for storage.
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),

    /// Key contains characters that cannot be used as a file name.
    #[error("invalid store key: {0}")]
    InvalidKey(String),

    /// The backend refused the operation. Not produced by the built-in
    /// backends; available to external [`KeyValueStore`] implementations.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable string storage addressed by fixed keys.
///
/// Implementations must make `set` atomic with respect to `get`: a concurrent
/// reader sees either the previous value or the new one, never a mix.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replaces the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// File-backed store keeping one file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the directory backing this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;

        // Temp files are created owner read/write only; values may hold credentials.
        let mut tmp = Builder::new()
            .prefix(&format!(".{key}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;

        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(key, bytes = value.len(), "Store value replaced");
        Ok(())
    }
}

/// In-memory store. Values do not survive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to the token and reminder entries.
///
/// The reminder read-modify-write in [`update_reminders`](Self::update_reminders)
/// and the wholesale [`replace_reminders`](Self::replace_reminders) share one
/// lock, so a resync can never be overwritten by a concurrent notifier pass
/// in the same process.
pub struct ReminderStore {
    kv: Arc<dyn KeyValueStore>,
    reminders_lock: Mutex<()>,
}

impl ReminderStore {
    /// Wraps a key-value backend.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            reminders_lock: Mutex::new(()),
        }
    }

    /// Returns the stored bearer token, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend read fails.
    pub fn token(&self) -> Result<Option<String>, StoreError> {
        self.kv.get(TOKEN_KEY)
    }

    /// Replaces the stored bearer token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend write fails.
    pub fn set_token(&self, token: &str) -> Result<(), StoreError> {
        self.kv.set(TOKEN_KEY, token)
    }

    /// Returns the stored reminders, or an empty collection if none were stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend read fails or the stored value is corrupt.
    pub fn reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        match self.kv.get(REMINDERS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                key: REMINDERS_KEY.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Replaces the whole reminder collection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if encoding or the backend write fails.
    pub fn replace_reminders(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        let _guard = self
            .reminders_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.write_reminders(reminders)
    }

    /// Applies `f` to the stored collection and writes it back if it changed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the read, decode, encode or write fails. On
    /// error nothing is written.
    pub fn update_reminders<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Reminder>) -> T,
    {
        let _guard = self
            .reminders_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let before = self.reminders()?;
        let mut working = before.clone();
        let result = f(&mut working);

        if working != before {
            self.write_reminders(&working)?;
        }

        Ok(result)
    }

    fn write_reminders(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(reminders)?;
        self.kv.set(REMINDERS_KEY, &encoded)
    }
}
