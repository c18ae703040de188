//! Key-value stores backing the watermark store
//!
//! `KvStore` is a single-key get/set seam. Failures are classified as
//! transient (worth retrying) or permanent (fail loudly).

use crate::storage::ObjectLocation;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

/// Failure reported by a key-value store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connectivity problem; the same call may succeed later
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The store refuses the operation; retrying will not help
    #[error("permanent store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    /// Whether retrying could help
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Durable single-key storage
#[async_trait]
pub trait KvStore: Send + Sync + fmt::Debug {
    /// Read a value; `None` if the key was never written
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store with failure injection
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: Mutex<HashMap<String, Bytes>>,
    failures: Mutex<VecDeque<StoreError>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MemoryKvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with `error`
    pub async fn inject_failures(&self, count: usize, error: StoreError) {
        let mut failures = self.failures.lock().await;
        failures.extend(std::iter::repeat(error).take(count));
    }

    /// Raw bytes stored under `key`
    pub async fn raw(&self, key: &str) -> Option<Bytes> {
        self.data.lock().await.get(key).cloned()
    }

    /// Store raw bytes, bypassing failure injection
    pub async fn insert_raw(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.data.lock().await.insert(key.into(), value.into());
    }

    /// Stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of `get` calls, including failed ones
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls, including failed ones
    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    async fn next_failure(&self) -> Option<StoreError> {
        self.failures.lock().await.pop_front()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_failure().await {
            return Err(error);
        }
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_failure().await {
            return Err(error);
        }
        self.data.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================================================
// Object store
// ============================================================================

/// Store keeping one `{key}.json` object per key on any `object_store` backend
#[derive(Debug, Clone)]
pub struct ObjectKvStore {
    location: ObjectLocation,
}

impl ObjectKvStore {
    /// Create a store at a parsed location
    pub fn new(location: ObjectLocation) -> Self {
        Self { location }
    }

    /// Parse a location URL (local path, `s3://`, `r2://`, `gs://`, `az://`, `memory://`)
    pub fn from_url(url: &str) -> crate::error::Result<Self> {
        ObjectLocation::parse(url).map(Self::new)
    }

    /// Where values are kept
    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }
}

#[async_trait]
impl KvStore for ObjectKvStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let path = self.location.path(&format!("{key}.json"));

        match self.location.store().get(&path).await {
            Ok(result) => result.bytes().await.map(Some).map_err(classify),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let path = self.location.path(&format!("{key}.json"));

        self.location
            .store()
            .put(&path, value.into())
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

fn classify(error: object_store::Error) -> StoreError {
    match error {
        object_store::Error::InvalidPath { .. }
        | object_store::Error::NotSupported { .. }
        | object_store::Error::NotImplemented
        | object_store::Error::PermissionDenied { .. }
        | object_store::Error::Unauthenticated { .. }
        | object_store::Error::UnknownConfigurationKey { .. }
        | object_store::Error::Precondition { .. }
        | object_store::Error::AlreadyExists { .. } => StoreError::Permanent(error.to_string()),
        other => StoreError::Transient(other.to_string()),
    }
}
