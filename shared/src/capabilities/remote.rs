use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::model::{DocumentId, UnixTimeMs, UserId};

pub const FEEDBACK_COLLECTION: &str = "feedback";
pub const SERVER_TIMESTAMP_KEY: &str = ".sv";

/// Placeholder the backend replaces with its own clock on write.
#[must_use]
pub fn server_timestamp() -> Value {
    serde_json::json!({ SERVER_TIMESTAMP_KEY: "timestamp" })
}

#[must_use]
pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|o| o.get(SERVER_TIMESTAMP_KEY))
        .and_then(Value::as_str)
        == Some("timestamp")
}

/// Path of a per-user document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentPath(String);

impl DocumentPath {
    #[must_use]
    pub fn preferences(user: &UserId) -> Self {
        Self(format!("users/{}/settings/preferences", user.as_str()))
    }

    #[must_use]
    pub fn profile(user: &UserId) -> Self {
        Self(format!("users/{}/settings/profile", user.as_str()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote store unavailable: {message}")]
    Unavailable { message: String },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("permission denied for {path}")]
    PermissionDenied { path: String },

    #[error("invalid document at {path}: {message}")]
    InvalidDocument { path: String, message: String },
}

impl RemoteError {
    pub fn invalid(path: &DocumentPath, e: impl fmt::Display) -> Self {
        Self::InvalidDocument {
            path: path.to_string(),
            message: e.to_string(),
        }
    }
}

/// Identity-scoped document storage. Every call is one network round trip.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, RemoteError>;

    /// Replaces the whole document.
    async fn set(&self, path: &DocumentPath, document: Value) -> Result<(), RemoteError>;

    /// Overwrites only the top-level fields present in `fields`.
    async fn merge(&self, path: &DocumentPath, fields: Value) -> Result<(), RemoteError>;

    /// Appends to a collection.
    async fn add(&self, collection: &str, document: Value) -> Result<DocumentId, RemoteError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Get(DocumentPath),
    Set(DocumentPath, Value),
    Merge(DocumentPath, Value),
    Add(String, Value),
}

/// In-process document store. Records every call for inspection.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    documents: Mutex<HashMap<DocumentPath, Value>>,
    collections: Mutex<HashMap<String, Vec<(DocumentId, Value)>>>,
    calls: Mutex<Vec<RemoteCall>>,
    offline: AtomicBool,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(self, path: DocumentPath, document: Value) -> Self {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, document);
        self
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    #[must_use]
    pub fn document(&self, path: &DocumentPath) -> Option<Value> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|docs| docs.iter().map(|(_, v)| v.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: RemoteCall) -> Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable {
                message: "offline".into(),
            });
        }
        Ok(())
    }
}

fn as_object(path: &DocumentPath, value: Value) -> Result<Map<String, Value>, RemoteError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RemoteError::invalid(
            path,
            format!("expected an object, got {other}"),
        )),
    }
}

fn resolve_server_timestamps(document: &mut Value, now: UnixTimeMs) {
    if let Value::Object(map) = document {
        for value in map.values_mut() {
            if is_server_timestamp(value) {
                *value = Value::from(now.0);
            }
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, RemoteError> {
        self.record(RemoteCall::Get(path.clone()))?;
        Ok(self.document(path))
    }

    async fn set(&self, path: &DocumentPath, document: Value) -> Result<(), RemoteError> {
        self.record(RemoteCall::Set(path.clone(), document.clone()))?;
        let document = Value::Object(as_object(path, document)?);
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), document);
        debug!(%path, "document replaced");
        Ok(())
    }

    async fn merge(&self, path: &DocumentPath, fields: Value) -> Result<(), RemoteError> {
        self.record(RemoteCall::Merge(path.clone(), fields.clone()))?;
        let fields = as_object(path, fields)?;
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = documents
            .entry(path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(existing) = entry {
            existing.extend(fields);
        } else {
            *entry = Value::Object(fields);
        }
        debug!(%path, "document merged");
        Ok(())
    }

    async fn add(&self, collection: &str, document: Value) -> Result<DocumentId, RemoteError> {
        self.record(RemoteCall::Add(collection.to_string(), document.clone()))?;
        let mut document = document;
        resolve_server_timestamps(&mut document, UnixTimeMs::now());
        let id = DocumentId::new(uuid::Uuid::new_v4().to_string());
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), document));
        debug!(collection, id = %id, "document added");
        Ok(id)
    }
}
