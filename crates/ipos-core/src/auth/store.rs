//! Storage for the single cached token.
//!
//! A store is one shared slot per session scope. Readers always see a whole
//! record or none: implementations replace the record as a unit.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StorageError;

use super::TokenRecord;

/// Token file name in the cache directory
const TOKEN_FILE: &str = "token.json";

pub trait TokenStore: Send + Sync {
    /// Current record, or `None` when no token has been obtained yet.
    fn read(&self) -> Result<Option<TokenRecord>, StorageError>;

    /// Replace the current record.
    fn write(&self, record: TokenRecord) -> Result<(), StorageError>;
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn read(&self) -> Result<Option<TokenRecord>, StorageError> {
        (**self).read()
    }

    fn write(&self, record: TokenRecord) -> Result<(), StorageError> {
        (**self).write(record)
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-wide slot. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<RwLock<Option<TokenRecord>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `record`.
    pub fn with_record(record: TokenRecord) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(record))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn read(&self) -> Result<Option<TokenRecord>, StorageError> {
        let guard = self.slot.read().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.clone())
    }

    fn write(&self, record: TokenRecord) -> Result<(), StorageError> {
        let mut guard = self.slot.write().map_err(|_| StorageError::Poisoned)?;
        *guard = Some(record);
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// On-disk shape. Either field may be missing in files written by other tools.
#[derive(Debug, Deserialize)]
struct StoredToken {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    #[serde(rename = "accessTokenObtainedAt")]
    access_token_obtained_at: Option<i64>,
}

/// Token persisted as JSON in the cache directory, so a session survives
/// process restarts.
///
/// Any number of instances, in one process or several, may share a
/// directory: each write goes through its own uniquely named temp file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }

    fn parse(path: &Path, contents: &str) -> Result<Option<TokenRecord>, StorageError> {
        let stored: StoredToken = serde_json::from_str(contents)?;

        let (Some(token), Some(millis)) = (stored.access_token, stored.access_token_obtained_at)
        else {
            return Ok(None);
        };
        if token.is_empty() {
            return Ok(None);
        }
        let Some(obtained_at) = DateTime::<Utc>::from_timestamp_millis(millis) else {
            warn!(path = %path.display(), millis, "Token timestamp out of range, ignoring");
            return Ok(None);
        };

        TokenRecord::new(token, obtained_at).map(Some)
    }
}

impl TokenStore for FileTokenStore {
    fn read(&self) -> Result<Option<TokenRecord>, StorageError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Self::parse(&path, &contents)
    }

    fn write(&self, record: TokenRecord) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let contents = serde_json::to_string_pretty(&record)?;

        // Same directory as the target, so the final rename is atomic.
        let mut temp = NamedTempFile::new_in(&self.cache_dir)?;
        temp.write_all(contents.as_bytes())?;
        temp.persist(self.path()).map_err(|e| e.error)?;

        debug!(path = %self.path().display(), "Token saved");
        Ok(())
    }
}
