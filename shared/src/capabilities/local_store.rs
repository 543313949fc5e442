use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Fixed keys of the on-device store. One key per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKey {
    UserPreferences,
    UserProfile,
    AppOpens,
    SimpleModeDisclaimerAccepted,
    TranslationHistory,
}

impl StorageKey {
    pub const ALL: [StorageKey; 5] = [
        StorageKey::UserPreferences,
        StorageKey::UserProfile,
        StorageKey::AppOpens,
        StorageKey::SimpleModeDisclaimerAccepted,
        StorageKey::TranslationHistory,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StorageKey::UserPreferences => "user_preferences",
            StorageKey::UserProfile => "user_profile",
            StorageKey::AppOpens => "app_opens",
            StorageKey::SimpleModeDisclaimerAccepted => "simple_mode_disclaimer_accepted",
            StorageKey::TranslationHistory => "ai_translation_history",
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum LocalStoreError {
    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("quota exceeded: {used}/{limit} bytes")]
    QuotaExceeded { used: u64, limit: u64 },

    #[error("serialization error: {message}")]
    Serialization { message: String, key: Option<String> },

    #[error("storage error: {message} (code: {code:?}, retryable: {retryable})")]
    Storage {
        code: StorageErrorCode,
        message: String,
        retryable: bool,
    },
}

impl LocalStoreError {
    pub fn storage(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self::Storage {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocalStoreError::Storage { retryable: true, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageErrorCode {
    Unknown,
    Corrupted,
    DiskFull,
    PermissionDenied,
    Busy,
    Locked,
    IoError,
}

impl StorageErrorCode {
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, StorageErrorCode::Busy | StorageErrorCode::Locked)
    }
}

/// Synchronous key/value persistence holding JSON text.
///
/// Never suspends: it is read before the first render.
pub trait LocalStore: Send + Sync {
    fn read_raw(&self, key: StorageKey) -> Result<Option<String>, LocalStoreError>;
    fn write_raw(&self, key: StorageKey, json: &str) -> Result<(), LocalStoreError>;
    fn remove(&self, key: StorageKey) -> Result<(), LocalStoreError>;
}

/// A typed view of one key. Failures are logged here and never reach callers
/// as errors on the read side.
pub struct TypedSlot<T> {
    key: StorageKey,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> TypedSlot<T> {
    #[must_use]
    pub const fn new(key: StorageKey) -> Self {
        Self {
            key,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn key(&self) -> StorageKey {
        self.key
    }

    /// Absent, unreadable and corrupt values all come back as `None`.
    pub fn load(&self, store: &dyn LocalStore) -> Option<T> {
        let raw = match store.read_raw(self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = self.key.as_str(), error = %e, "local read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = self.key.as_str(), error = %e, "discarding corrupt local value");
                None
            }
        }
    }

    pub fn save(&self, store: &dyn LocalStore, value: &T) -> Result<(), LocalStoreError> {
        let result = encode(self.key, value).and_then(|json| store.write_raw(self.key, &json));
        match &result {
            Ok(()) => debug!(key = self.key.as_str(), "local value written"),
            Err(e) => warn!(key = self.key.as_str(), error = %e, "local write failed"),
        }
        result
    }

    pub fn clear(&self, store: &dyn LocalStore) -> Result<(), LocalStoreError> {
        let result = store.remove(self.key);
        if let Err(e) = &result {
            warn!(key = self.key.as_str(), error = %e, "local remove failed");
        }
        result
    }
}

fn encode<T: Serialize>(key: StorageKey, value: &T) -> Result<String, LocalStoreError> {
    let json = serde_json::to_string(value).map_err(|e| LocalStoreError::Serialization {
        message: e.to_string(),
        key: Some(key.as_str().to_string()),
    })?;
    if json.len() > MAX_VALUE_SIZE {
        return Err(LocalStoreError::ValueTooLarge {
            size: json.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(json)
}

// ============================================================================
// In-memory store
// ============================================================================

/// HashMap-backed store with an optional total byte quota.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    values: Mutex<HashMap<StorageKey, String>>,
    quota: Option<u64>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(limit: u64) -> Self {
        Self {
            values: Mutex::default(),
            quota: Some(limit),
        }
    }

    /// Seeds a raw value, bypassing validation. Used to simulate stale or
    /// corrupt data left by an earlier build.
    #[must_use]
    pub fn with_raw(self, key: StorageKey, raw: impl Into<String>) -> Self {
        self.insert_raw(key, raw);
        self
    }

    pub fn insert_raw(&self, key: StorageKey, raw: impl Into<String>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, raw.into());
    }

    #[must_use]
    pub fn raw(&self, key: StorageKey) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

impl LocalStore for MemoryLocalStore {
    fn read_raw(&self, key: StorageKey) -> Result<Option<String>, LocalStoreError> {
        Ok(self.raw(key))
    }

    fn write_raw(&self, key: StorageKey, json: &str) -> Result<(), LocalStoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = self.quota {
            let others: usize = values
                .iter()
                .filter(|(k, _)| **k != key)
                .map(|(_, v)| v.len())
                .sum();
            let used = (others + json.len()) as u64;
            if used > limit {
                return Err(LocalStoreError::QuotaExceeded { used, limit });
            }
        }
        values.insert(key, json.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), LocalStoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        Ok(())
    }
}

// ============================================================================
// SQLite store
// ============================================================================

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use self::sqlite::SqliteLocalStore;

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
mod sqlite {
    use super::{LocalStore, LocalStoreError, StorageErrorCode, StorageKey};
    use rusqlite::{params, Connection, OptionalExtension};
    use std::path::Path;
    use std::sync::{Mutex, PoisonError};
    use tracing::info;

    /// File-backed store with one `kv(key, value)` table.
    pub struct SqliteLocalStore {
        conn: Mutex<Connection>,
    }

    impl SqliteLocalStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
            let conn = Connection::open(path.as_ref()).map_err(map_sql_error)?;
            info!(path = %path.as_ref().display(), "opened local store");
            Self::init(conn)
        }

        pub fn open_in_memory() -> Result<Self, LocalStoreError> {
            Self::init(Connection::open_in_memory().map_err(map_sql_error)?)
        }

        fn init(conn: Connection) -> Result<Self, LocalStoreError> {
            conn.execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                ",
            )
            .map_err(map_sql_error)?;
            Ok(Self {
                conn: Mutex::new(conn),
            })
        }

        fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
            self.conn.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl LocalStore for SqliteLocalStore {
        fn read_raw(&self, key: StorageKey) -> Result<Option<String>, LocalStoreError> {
            self.conn()
                .query_row(
                    "SELECT value FROM kv WHERE key = ?1",
                    params![key.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)
        }

        fn write_raw(&self, key: StorageKey, json: &str) -> Result<(), LocalStoreError> {
            self.conn()
                .execute(
                    r"
                    INSERT INTO kv (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value
                    ",
                    params![key.as_str(), json],
                )
                .map_err(map_sql_error)?;
            Ok(())
        }

        fn remove(&self, key: StorageKey) -> Result<(), LocalStoreError> {
            self.conn()
                .execute("DELETE FROM kv WHERE key = ?1", params![key.as_str()])
                .map_err(map_sql_error)?;
            Ok(())
        }
    }

    fn map_sql_error(e: rusqlite::Error) -> LocalStoreError {
        let code = match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) => StorageErrorCode::Busy,
            Some(rusqlite::ErrorCode::DatabaseLocked) => StorageErrorCode::Locked,
            Some(rusqlite::ErrorCode::DiskFull) => StorageErrorCode::DiskFull,
            Some(rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase) => {
                StorageErrorCode::Corrupted
            }
            Some(rusqlite::ErrorCode::PermissionDenied | rusqlite::ErrorCode::ReadOnly) => {
                StorageErrorCode::PermissionDenied
            }
            Some(rusqlite::ErrorCode::SystemIoFailure | rusqlite::ErrorCode::CannotOpen) => {
                StorageErrorCode::IoError
            }
            _ => StorageErrorCode::Unknown,
        };
        LocalStoreError::storage(code, e.to_string())
    }
}
