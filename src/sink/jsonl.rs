//! JSON-lines sink on object storage
//!
//! Each page becomes one object under a Hive-style partition:
//! `{resource}/dt={YYYY-MM-DD}/{run_id}-{page:05}.jsonl`
//!
//! `finish` writes `{run_id}-manifest.json` next to the pages. Loaders treat a
//! run's pages as complete only once the manifest exists, and apply them by
//! primary key according to the manifest's write mode.

use super::{RecordBatch, Sink};
use crate::error::{Error, Result};
use crate::storage::ObjectLocation;
use crate::types::WriteMode;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Build a Hive-style partitioned path for an output file
///
/// Format: `{resource}/dt={YYYY-MM-DD}/{file_name}`
pub fn build_partitioned_path(resource: &str, date: &str, file_name: &str) -> String {
    // Dots would read as extensions on some filesystems
    let sanitized = resource.replace('.', "_");
    format!("{sanitized}/dt={date}/{file_name}")
}

#[derive(Debug, Default)]
struct PendingLoad {
    files: Vec<String>,
    records: usize,
    primary_key: Vec<String>,
    write_mode: WriteMode,
}

#[derive(Debug, Serialize)]
struct LoadManifest<'a> {
    resource: &'a str,
    run_id: &'a str,
    primary_key: &'a [String],
    write_mode: WriteMode,
    files: &'a [String],
    records: usize,
    completed_at: DateTime<Utc>,
}

/// Sink writing newline-delimited JSON files
#[derive(Debug)]
pub struct JsonlSink {
    location: ObjectLocation,
    run_id: String,
    date: String,
    pending: Mutex<HashMap<String, PendingLoad>>,
}

impl JsonlSink {
    /// Create a sink for a run starting now
    pub fn new(location: ObjectLocation) -> Self {
        Self::for_run(location, Utc::now())
    }

    /// Create a sink for a run started at `started_at`
    pub fn for_run(location: ObjectLocation, started_at: DateTime<Utc>) -> Self {
        Self {
            location,
            run_id: started_at.format("%Y%m%dT%H%M%SZ").to_string(),
            date: started_at.format("%Y-%m-%d").to_string(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Parse a destination URL (local path, `s3://`, `r2://`, `gs://`, `az://`)
    pub fn from_url(url: &str) -> Result<Self> {
        ObjectLocation::parse(url).map(Self::new)
    }

    /// Identifier of this run, used as the file name prefix
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    async fn put(&self, resource: &str, file_name: &str, data: Bytes) -> Result<String> {
        let relative = build_partitioned_path(resource, &self.date, file_name);
        let path = self.location.path(&relative);

        self.location
            .store()
            .put(&path, data.into())
            .await
            .map_err(|e| Error::sink(resource, format!("Failed to write {path}: {e}")))?;

        Ok(relative)
    }
}

fn encode_lines(batch: &RecordBatch) -> Result<Bytes> {
    let mut buf = Vec::new();
    for record in &batch.records {
        serde_json::to_writer(&mut buf, record)?;
        buf.push(b'\n');
    }
    Ok(Bytes::from(buf))
}

#[async_trait]
impl Sink for JsonlSink {
    async fn write_batch(&self, batch: RecordBatch) -> Result<()> {
        let written = if batch.is_empty() {
            None
        } else {
            let file_name = format!("{}-{:05}.jsonl", self.run_id, batch.page);
            let data = encode_lines(&batch)?;
            let written = self.put(&batch.resource, &file_name, data).await?;

            debug!(
                resource = %batch.resource,
                page = batch.page,
                records = batch.len(),
                path = %written,
                "wrote batch"
            );
            Some(written)
        };

        let mut pending = self.pending.lock().await;
        if batch.page == 1 {
            // A first page always opens a new attempt
            pending.remove(&batch.resource);
        }
        let load = pending.entry(batch.resource.clone()).or_default();
        load.primary_key.clone_from(&batch.primary_key);
        load.write_mode = batch.write_mode;
        if let Some(written) = written {
            load.records += batch.len();
            load.files.push(written);
        }
        Ok(())
    }

    async fn finish(&self, resource: &str) -> Result<()> {
        let load = self.pending.lock().await.remove(resource).unwrap_or_default();

        let manifest = LoadManifest {
            resource,
            run_id: &self.run_id,
            primary_key: &load.primary_key,
            write_mode: load.write_mode,
            files: &load.files,
            records: load.records,
            completed_at: Utc::now(),
        };
        let data = Bytes::from(serde_json::to_vec_pretty(&manifest)?);
        let written = self
            .put(resource, &format!("{}-manifest.json", self.run_id), data)
            .await?;

        info!(
            resource,
            files = load.files.len(),
            records = load.records,
            destination = %self.location.display(&self.location.path(&written)),
            "load complete"
        );
        Ok(())
    }

    async fn abort(&self, resource: &str) -> Result<()> {
        if let Some(load) = self.pending.lock().await.remove(resource) {
            warn!(
                resource,
                files = load.files.len(),
                records = load.records,
                "discarding unconfirmed load"
            );
        }
        Ok(())
    }
}
