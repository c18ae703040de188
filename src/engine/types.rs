//! Engine types
//!
//! Run configuration, the sync window, clocks and run reports.

use crate::error::{Error, FailureKind, Result};
use crate::registry::ResourceDefinition;
use crate::state::Watermark;
use crate::types::{format_query_timestamp, parse_timestamp, QueryParams};
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Configuration for sync runs
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Lower bound for resources without a watermark
    pub start_date: DateTime<Utc>,
    /// Page size requested from upstream (`limit`); upstream default if unset
    pub page_limit: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_date: DateTime::<Utc>::default(),
            page_limit: None,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new(start_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            ..Self::default()
        }
    }

    /// Parse the start date from user input (`2023-01-01`, RFC 3339, ...)
    pub fn from_start_date(start_date: &str) -> Result<Self> {
        Ok(Self::new(parse_timestamp(start_date)?))
    }

    /// Set page size
    #[must_use]
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);
        self
    }
}

// ============================================================================
// Window
// ============================================================================

/// Time range and projection of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWindow {
    pub resource: String,
    /// Records updated at or after this instant
    pub lower_bound: DateTime<Utc>,
    /// Records updated at or before this instant
    pub upper_bound: DateTime<Utc>,
    /// Comma-joined fields to request
    pub field_projection: Option<String>,
    pub primary_key: Vec<String>,
}

impl SyncWindow {
    /// Build the window for a resource.
    ///
    /// Fails when `lower_bound` is after `upper_bound`.
    pub fn new(
        definition: &ResourceDefinition,
        lower_bound: DateTime<Utc>,
        upper_bound: DateTime<Utc>,
    ) -> Result<Self> {
        if lower_bound > upper_bound {
            return Err(Error::InvalidWindow {
                resource: definition.name.clone(),
                lower: format_query_timestamp(&lower_bound),
                upper: format_query_timestamp(&upper_bound),
            });
        }

        Ok(Self {
            resource: definition.name.clone(),
            lower_bound,
            upper_bound,
            field_projection: definition.field_projection(),
            primary_key: definition.primary_key.clone(),
        })
    }

    /// Query parameters for the first page request
    pub fn query_params(&self, page_limit: Option<u32>) -> QueryParams {
        let mut params = vec![
            (
                "updated_at_min".to_string(),
                format_query_timestamp(&self.lower_bound),
            ),
            (
                "updated_at_max".to_string(),
                format_query_timestamp(&self.upper_bound),
            ),
        ];
        if let Some(fields) = &self.field_projection {
            params.push(("fields".to_string(), fields.clone()));
        }
        if let Some(limit) = page_limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            format_query_timestamp(&self.lower_bound),
            format_query_timestamp(&self.upper_bound)
        )
    }
}

// ============================================================================
// Phases
// ============================================================================

/// Where a resource run is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Loading the prior watermark
    Init,
    /// Computing the window
    WindowOpen,
    /// Fetching pages and handing them to the sink
    Draining,
    /// Confirming the load and saving the watermark
    Committing,
    Done,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Init => "init",
            Self::WindowOpen => "window-open",
            Self::Draining => "draining",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// A test helper for library users: pass it to [`SyncEngine::with_clock`]
/// to pin window upper bounds and `run_created_at` to known instants.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use shopify_sync::engine::{Clock, FixedClock};
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap());
/// clock.advance(chrono::Duration::hours(1));
/// assert_eq!(clock.now(), Utc.with_ymd_and_hms(2023, 6, 1, 13, 0, 0).unwrap());
/// ```
///
/// [`SyncEngine::with_clock`]: crate::engine::SyncEngine::with_clock
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    /// Start at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(now.timestamp_millis()),
        }
    }

    /// Jump to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move forward by `by`
    pub fn advance(&self, by: chrono::Duration) {
        self.millis
            .fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of a completed resource run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub resource: String,
    pub window: SyncWindow,
    /// Pages fetched
    pub pages: usize,
    /// Records handed to the sink
    pub records: usize,
    /// Watermark saved at commit
    pub watermark: Watermark,
    pub duration_ms: u64,
}

/// Outcome of one resource within `sync_all`
#[derive(Debug)]
pub struct ResourceOutcome {
    pub resource: String,
    pub result: Result<SyncReport>,
}

impl ResourceOutcome {
    /// Check if the run committed
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Failure classification, if the run failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.result.as_ref().err().map(Error::kind)
    }
}
