//! In-memory sink

use super::{RecordBatch, Sink};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<RecordBatch>>,
    finished: Mutex<Vec<String>>,
    aborted: Mutex<Vec<String>>,
    fail_writes_from_page: Mutex<Option<usize>>,
    fail_finish: Mutex<bool>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every batch whose page number is at least `page`
    pub async fn fail_writes_from_page(&self, page: usize) {
        *self.fail_writes_from_page.lock().await = Some(page);
    }

    /// Make `finish` fail
    pub async fn fail_finish(&self) {
        *self.fail_finish.lock().await = true;
    }

    /// All accepted batches, in arrival order
    pub async fn batches(&self) -> Vec<RecordBatch> {
        self.batches.lock().await.clone()
    }

    /// Accepted records of a resource, in arrival order
    pub async fn records(&self, resource: &str) -> Vec<JsonValue> {
        self.batches
            .lock()
            .await
            .iter()
            .filter(|b| b.resource == resource)
            .flat_map(|b| b.records.iter().cloned())
            .collect()
    }

    /// Resources whose load was confirmed, in order
    pub async fn finished(&self) -> Vec<String> {
        self.finished.lock().await.clone()
    }

    /// Resources whose run was abandoned, in order
    pub async fn aborted(&self) -> Vec<String> {
        self.aborted.lock().await.clone()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write_batch(&self, batch: RecordBatch) -> Result<()> {
        if let Some(page) = *self.fail_writes_from_page.lock().await {
            if batch.page >= page {
                return Err(Error::sink(
                    &batch.resource,
                    format!("rejected page {}", batch.page),
                ));
            }
        }

        self.batches.lock().await.push(batch);
        Ok(())
    }

    async fn finish(&self, resource: &str) -> Result<()> {
        if *self.fail_finish.lock().await {
            return Err(Error::sink(resource, "load was not confirmed"));
        }

        self.finished.lock().await.push(resource.to_string());
        Ok(())
    }

    async fn abort(&self, resource: &str) -> Result<()> {
        self.aborted.lock().await.push(resource.to_string());
        Ok(())
    }
}
