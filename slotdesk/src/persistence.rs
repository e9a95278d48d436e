//! Durable key-value storage for the application state.
//!
//! The whole [`AppState`] lives as one JSON document under
//! [`APP_STATE_KEY`]. [`BlobSink`] plugs a [`BlobStore`] into the store's
//! write path so every accepted action is written before the next one runs.

use crate::allocation::DeskState;
use crate::model::AppState;
use crate::snapshot;
use slotdesk_runtime::{PersistError, StateSink};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Key the application state is stored under
pub const APP_STATE_KEY: &str = "experience-app-state";

/// Failure of the storage backend
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// Reading, writing or removing a blob failed
    #[error("storage error for '{key}': {source}")]
    Io {
        /// Blob key
        key: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Key cannot be mapped to storage
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

/// Synchronous string blobs by key
pub trait BlobStore: Send + Sync {
    /// Read a blob; `Ok(None)` when absent
    ///
    /// # Errors
    ///
    /// Returns [`BlobStoreError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, BlobStoreError>;

    /// Write a blob, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns [`BlobStoreError`] when the backend cannot be written.
    fn put(&self, key: &str, value: &str) -> Result<(), BlobStoreError>;

    /// Delete a blob; absent keys are fine
    ///
    /// # Errors
    ///
    /// Returns [`BlobStoreError`] when the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), BlobStoreError>;
}

/// One file per key inside a data directory
///
/// Writes go to a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Use `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns [`BlobStoreError::Io`] when the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, BlobStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| BlobStoreError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The data directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobStoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(BlobStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("blob")
    ));
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(tmp_path, path)?;
    Ok(())
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, BlobStoreError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(BlobStoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), BlobStoreError> {
        let path = self.path_for(key)?;
        write_atomic(&path, value.as_bytes()).map_err(|source| BlobStoreError::Io {
            key: key.to_string(),
            source,
        })
    }

    fn remove(&self, key: &str) -> Result<(), BlobStoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(BlobStoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// Blobs kept in process memory
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, BlobStoreError> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), BlobStoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BlobStoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Writes [`DeskState::app`] to a [`BlobStore`] after every action
#[derive(Clone)]
pub struct BlobSink {
    store: Arc<dyn BlobStore>,
    key: String,
}

impl BlobSink {
    /// Persist under [`APP_STATE_KEY`]
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            key: APP_STATE_KEY.to_string(),
        }
    }
}

impl StateSink<DeskState> for BlobSink {
    fn persist(&self, state: &DeskState) -> Result<(), PersistError> {
        let json =
            serde_json::to_string(&state.app).map_err(|e| PersistError::Encode(e.to_string()))?;
        self.store
            .put(&self.key, &json)
            .map_err(|e| PersistError::Write(e.to_string()))
    }
}

/// How the startup load went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing stored yet; starting fresh
    Fresh,
    /// Stored state accepted
    Restored,
    /// Stored state was unreadable and has been removed
    Discarded {
        /// Why it was rejected
        reason: String,
    },
}

/// Read the persisted state at startup
///
/// An absent blob yields the initial state. A blob that fails to parse or
/// validate is removed and the initial state is returned.
///
/// # Errors
///
/// Returns [`BlobStoreError`] when the backend itself cannot be read, or the
/// invalid blob cannot be removed.
pub fn load_app_state(store: &dyn BlobStore) -> Result<(AppState, LoadOutcome), BlobStoreError> {
    let Some(raw) = store.get(APP_STATE_KEY)? else {
        tracing::info!("No saved state found, starting with initial state");
        return Ok((AppState::initial(), LoadOutcome::Fresh));
    };

    match snapshot::parse_state(&raw) {
        Ok(state) => {
            tracing::info!(
                slots = state.slots.len(),
                history = state.history.len(),
                waiting = state.waiting_list.len(),
                "Saved state loaded"
            );
            Ok((state, LoadOutcome::Restored))
        },
        Err(error) => {
            tracing::error!(%error, "Failed to load saved state, resetting");
            store.remove(APP_STATE_KEY)?;
            Ok((
                AppState::initial(),
                LoadOutcome::Discarded {
                    reason: error.to_string(),
                },
            ))
        },
    }
}
