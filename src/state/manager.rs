//! Watermark store
//!
//! Maps a resource to its persisted [`Watermark`] under the key
//! `"{namespace}_{resource}"`. Transient store failures are retried with
//! backoff and jitter; everything else fails immediately.

use super::store::{KvStore, StoreError};
use super::types::Watermark;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "dlt_shopify";

/// Durable resource → watermark mapping
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    store: Arc<dyn KvStore>,
    namespace: String,
    retry: RetryPolicy,
}

impl WatermarkStore {
    /// Create a store under the default namespace and retry policy
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            namespace: DEFAULT_NAMESPACE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a different key namespace
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Use a different retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Key namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Store key for a resource
    pub fn key_for(&self, resource: &str) -> String {
        format!("{}_{resource}", self.namespace)
    }

    /// Load the watermark of a resource; `None` if it was never synced
    pub async fn load(&self, resource: &str) -> Result<Option<Watermark>> {
        let key = self.key_for(resource);
        let raw = self.retrying(&key, || self.store.get(&key)).await?;

        let Some(raw) = raw else {
            debug!(key = %key, "no watermark stored");
            return Ok(None);
        };

        let watermark = serde_json::from_slice::<Watermark>(&raw).map_err(|e| {
            Error::CorruptWatermark {
                key: key.clone(),
                message: e.to_string(),
            }
        })?;

        debug!(key = %key, last_value = %watermark.last_value, "loaded watermark");
        Ok(Some(watermark))
    }

    /// Persist the watermark of a resource
    pub async fn save(&self, resource: &str, watermark: &Watermark) -> Result<()> {
        let key = self.key_for(resource);
        let bytes = Bytes::from(serde_json::to_vec(watermark)?);

        self.retrying(&key, || self.store.set(&key, bytes.clone()))
            .await?;

        debug!(key = %key, last_value = %watermark.last_value, "saved watermark");
        Ok(())
    }

    /// Run `op` until it succeeds, fails permanently or exhausts the policy
    async fn retrying<T, F, Fut>(&self, key: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !error.is_transient() || !self.retry.should_retry(attempt) {
                return Err(Error::FatalStore {
                    key: key.to_string(),
                    attempts: attempt,
                    message: error.to_string(),
                });
            }

            let delay = self.retry.delay_for(attempt - 1);
            warn!(
                key,
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "watermark store unavailable, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
