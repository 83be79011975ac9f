// Persisted session storage
// Durable key-value entries that let a session survive process restarts

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::User;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const USER_DATA_KEY: &str = "userData";

const STORAGE_FILE_NAME: &str = "session.json";
const STORAGE_DIR_NAME: &str = "travel-session-client";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage is corrupt: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

// Async string key-value store shared by the session store and the API client
#[async_trait]
pub trait SessionStorage: Send + Sync + 'static {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    // Removing a missing key is not an error
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Reads the persisted token and user.
///
/// Returns `None` when either entry is missing or the user record does not
/// decode; a partial record is never surfaced as a session.
pub async fn load_session(
    storage: &dyn SessionStorage,
) -> Result<Option<(String, User)>, StorageError> {
    let token = storage.get_item(AUTH_TOKEN_KEY).await?;
    let user = storage.get_item(USER_DATA_KEY).await?;

    match (token, user) {
        (Some(token), Some(raw_user)) => match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => Ok(Some((token, user))),
            Err(err) => {
                warn!(error = %err, "Persisted user record does not decode");
                Ok(None)
            }
        },
        (None, None) => Ok(None),
        (token, user) => {
            debug!(
                has_token = token.is_some(),
                has_user = user.is_some(),
                "Partial persisted session treated as absent"
            );
            Ok(None)
        }
    }
}

pub async fn save_session(
    storage: &dyn SessionStorage,
    token: &str,
    user: &User,
) -> Result<(), StorageError> {
    let raw_user = serde_json::to_string(user)?;
    storage.set_item(AUTH_TOKEN_KEY, token).await?;
    storage.set_item(USER_DATA_KEY, &raw_user).await
}

// Both removals are always attempted; the first failure is reported
pub async fn clear_session(storage: &dyn SessionStorage) -> Result<(), StorageError> {
    let (token, user) = futures::join!(
        storage.remove_item(AUTH_TOKEN_KEY),
        storage.remove_item(USER_DATA_KEY)
    );
    token.and(user)
}

// In-process storage, used in tests and by hosts without a writable disk
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, String>,
    fail_next_operations: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    // Makes the next `count` operations fail with `StorageError::Unavailable`
    pub fn fail_next_operations(&self, count: usize) {
        self.fail_next_operations.store(count, Ordering::SeqCst);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_failure(&self) -> Result<(), StorageError> {
        let pending = self
            .fail_next_operations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match pending {
            Ok(_) => Err(StorageError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_failure()?;
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_failure()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check_failure()?;
        self.entries.remove(key);
        Ok(())
    }
}

/// File-backed storage holding every key in one JSON object.
///
/// Writes go to a sibling temp file that is then renamed over the original,
/// so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    // `<data dir>/travel-session-client/session.json`
    pub fn default_location() -> Result<Self, StorageError> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            StorageError::Unavailable("no platform data directory".to_string())
        })?;
        Ok(Self::open(
            data_dir.join(STORAGE_DIR_NAME).join(STORAGE_FILE_NAME),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<HashMap<String, String>, StorageError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|err| {
            StorageError::Corrupt(format!("{}: {}", self.path.display(), err))
        })
    }

    async fn write_entries(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.io_lock.lock().await;
        let mut entries = self.read_entries().await?;
        Ok(entries.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.io_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.io_lock.lock().await;
        let mut entries = self.read_entries().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_entries(&entries).await
    }
}
