//! Sink module
//!
//! Destination for extracted records.
//!
//! # Overview
//!
//! The engine hands every page to [`Sink::write_batch`] as soon as it is
//! fetched, then calls [`Sink::finish`] once the resource is fully drained.
//! A successful `finish` is the signal that the run's data was loaded and
//! the watermark may move. A run that fails before `finish` is reported
//! through [`Sink::abort`], so a later attempt starts from nothing.
//!
//! - `MemorySink` - keeps batches in memory
//! - `JsonlSink` - newline-delimited JSON on any `object_store` backend

mod jsonl;
mod memory;

pub use jsonl::{build_partitioned_path, JsonlSink};
pub use memory::MemorySink;

use crate::error::Result;
use crate::types::{JsonValue, WriteMode};
use async_trait::async_trait;
use std::fmt;

/// One page of records bound for the destination
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    /// Resource the records belong to
    pub resource: String,
    /// Columns identifying a record
    pub primary_key: Vec<String>,
    /// How the destination should apply the records
    pub write_mode: WriteMode,
    /// 1-based page number within the run
    pub page: usize,
    /// Records as received from upstream
    pub records: Vec<JsonValue>,
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Downstream destination
#[async_trait]
pub trait Sink: Send + Sync + fmt::Debug {
    /// Accept one batch
    async fn write_batch(&self, batch: RecordBatch) -> Result<()>;

    /// Confirm that everything written for `resource` in this run is loaded
    async fn finish(&self, resource: &str) -> Result<()>;

    /// Forget everything written for `resource` since the last `finish`
    async fn abort(&self, resource: &str) -> Result<()>;
}
