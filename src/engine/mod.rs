//! Execution engine module
//!
//! Incremental sync of one or more resources.
//!
//! # Overview
//!
//! Each resource run moves through `Init → WindowOpen → Draining →
//! Committing → Done`, or ends in `Failed`:
//!
//! 1. load the prior watermark (absent: the configured start date)
//! 2. open the window `[lower, now]`
//! 3. stream every page and hand it to the sink before asking for the next
//! 4. once the stream ends cleanly and the sink confirms the load, save the
//!    new watermark
//!
//! Nothing is saved on any failure or cancellation before step 4, so the
//! next run retries the same window.

mod types;

pub use types::{
    Clock, FixedClock, ResourceOutcome, SyncConfig, SyncPhase, SyncReport, SyncWindow,
    SystemClock,
};

use crate::error::{Error, Result};
use crate::pagination::PageFetcher;
use crate::registry::{ResourceDefinition, ResourceRegistry};
use crate::sink::{RecordBatch, Sink};
use crate::state::{Watermark, WatermarkStore};
use crate::types::{format_query_timestamp, truncate_to_seconds, JsonValue};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sync engine for incremental extraction
#[derive(Debug, Clone)]
pub struct SyncEngine {
    fetcher: PageFetcher,
    watermarks: WatermarkStore,
    sink: Arc<dyn Sink>,
    registry: Arc<ResourceRegistry>,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
}

impl SyncEngine {
    /// Create a new sync engine on the wall clock
    pub fn new(
        fetcher: PageFetcher,
        watermarks: WatermarkStore,
        sink: Arc<dyn Sink>,
        registry: Arc<ResourceRegistry>,
        config: SyncConfig,
    ) -> Self {
        Self {
            fetcher,
            watermarks,
            sink,
            registry,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync one resource.
    ///
    /// The watermark moves only if every page was delivered and the sink
    /// confirmed the load.
    pub async fn sync_resource(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let mut run = RunProgress::new(name);

        let result = match self.registry.get(name) {
            Ok(definition) => self.drive(definition, cancel, &mut run).await,
            Err(e) => Err(e),
        };

        match result {
            Ok((window, pages, records, watermark)) => {
                run.enter(SyncPhase::Done);
                let report = SyncReport {
                    resource: name.to_string(),
                    window,
                    pages,
                    records,
                    watermark,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                info!(
                    resource = name,
                    window = %report.window,
                    pages,
                    records,
                    watermark = %report.watermark.last_value,
                    duration_ms = report.duration_ms,
                    "sync committed"
                );
                Ok(report)
            }
            Err(err) => {
                let failed_in = run.phase;
                run.enter(SyncPhase::Failed);
                if run.endpoint.is_some() {
                    if let Err(abort_err) = self.sink.abort(name).await {
                        warn!(resource = name, error = %abort_err, "sink abort failed");
                    }
                }
                let (lower, upper) = run.bounds();
                error!(
                    resource = name,
                    phase = %failed_in,
                    lower_bound = lower.as_deref().unwrap_or("-"),
                    upper_bound = upper.as_deref().unwrap_or("-"),
                    endpoint = run.endpoint.as_deref().unwrap_or("-"),
                    kind = %err.kind(),
                    error = %err,
                    "sync failed, watermark left untouched"
                );
                Err(err)
            }
        }
    }

    /// Sync several resources concurrently.
    ///
    /// Returns one outcome per distinct name, in input order. A failure in
    /// one resource never stops the others.
    pub async fn sync_all(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Vec<ResourceOutcome> {
        let mut seen = HashSet::new();
        let mut distinct = Vec::with_capacity(names.len());
        for name in names {
            if seen.insert(name.as_str()) {
                distinct.push(name.clone());
            } else {
                warn!(resource = %name, "resource requested twice, syncing once");
            }
        }

        let runs = distinct.into_iter().map(|resource| async move {
            let result = self.sync_resource(&resource, cancel).await;
            ResourceOutcome { resource, result }
        });

        futures::future::join_all(runs).await
    }

    async fn drive(
        &self,
        definition: &ResourceDefinition,
        cancel: &CancellationToken,
        run: &mut RunProgress,
    ) -> Result<(SyncWindow, usize, usize, Watermark)> {
        let name = definition.name.as_str();

        run.enter(SyncPhase::Init);
        let prior = until_cancelled(cancel, name, self.watermarks.load(name)).await?;

        run.enter(SyncPhase::WindowOpen);
        let upper_bound = truncate_to_seconds(self.clock.now());
        let lower_bound = prior
            .as_ref()
            .map_or(self.config.start_date, |w| w.last_value);
        run.lower = Some(lower_bound);
        run.upper = Some(upper_bound);
        let window = SyncWindow::new(definition, lower_bound, upper_bound)?;

        run.enter(SyncPhase::Draining);
        let endpoint = definition.endpoint();
        run.endpoint = Some(endpoint.to_string());

        let query = window.query_params(self.config.page_limit);
        let pages = self.fetcher.fetch(endpoint, query);
        futures::pin_mut!(pages);

        let mut boundary = Boundary::default();
        let mut page_count = 0;
        let mut record_count = 0;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::cancelled(name)),
                next = pages.next() => next,
            };
            let Some(page) = next else { break };
            let page = page?;

            boundary.observe(definition, &page.records);
            page_count += 1;
            record_count += page.records.len();

            self.sink
                .write_batch(RecordBatch {
                    resource: name.to_string(),
                    primary_key: definition.primary_key.clone(),
                    write_mode: definition.write_mode,
                    page: page.number,
                    records: page.records,
                })
                .await?;
        }

        if cancel.is_cancelled() {
            return Err(Error::cancelled(name));
        }

        run.enter(SyncPhase::Committing);
        self.sink.finish(name).await?;

        let run_created_at = truncate_to_seconds(self.clock.now());
        let unique_hashes = boundary.into_hashes();
        let watermark = match &prior {
            Some(prior) => prior.advance(upper_bound, unique_hashes, run_created_at),
            None => Watermark::first(lower_bound, upper_bound, run_created_at)
                .with_unique_hashes(unique_hashes),
        };

        self.watermarks.save(name, &watermark).await?;

        Ok((window, page_count, record_count, watermark))
    }
}

/// Await `fut` unless the run is cancelled first
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    resource: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(Error::cancelled(resource));
    }

    let value = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(Error::cancelled(resource)),
        value = fut => value?,
    };

    if cancel.is_cancelled() {
        return Err(Error::cancelled(resource));
    }
    Ok(value)
}

/// Phase and window of a run, for logging
#[derive(Debug)]
struct RunProgress {
    resource: String,
    phase: SyncPhase,
    lower: Option<DateTime<Utc>>,
    upper: Option<DateTime<Utc>>,
    endpoint: Option<String>,
}

impl RunProgress {
    fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            phase: SyncPhase::Init,
            lower: None,
            upper: None,
            endpoint: None,
        }
    }

    fn enter(&mut self, phase: SyncPhase) {
        debug!(resource = %self.resource, from = %self.phase, to = %phase, "phase");
        self.phase = phase;
    }

    fn bounds(&self) -> (Option<String>, Option<String>) {
        (
            self.lower.as_ref().map(format_query_timestamp),
            self.upper.as_ref().map(format_query_timestamp),
        )
    }
}

/// Records sitting on the highest cursor value seen so far
#[derive(Debug, Default)]
struct Boundary {
    max: Option<DateTime<Utc>>,
    ids: BTreeSet<String>,
}

impl Boundary {
    fn observe(&mut self, definition: &ResourceDefinition, records: &[JsonValue]) {
        for record in records {
            let Some(value) = definition.cursor_value(record) else {
                continue;
            };

            match self.max {
                Some(max) if value < max => {}
                Some(max) if value == max => {
                    self.ids.insert(definition.record_id(record));
                }
                _ => {
                    self.max = Some(value);
                    self.ids.clear();
                    self.ids.insert(definition.record_id(record));
                }
            }
        }
    }

    fn into_hashes(self) -> BTreeSet<String> {
        self.ids
    }
}

#[cfg(test)]
mod tests;
