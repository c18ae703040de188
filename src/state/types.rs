//! Watermark record persisted between runs
//!
//! Serialized as a JSON object with second-precision UTC timestamps:
//! `{"initial_value": "2023-01-01 00:00:00", "last_value": ..., "unique_hashes": [...], "run_created_at": ...}`

use crate::types::watermark_time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Incremental progress for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Lower bound of the very first run; never changes afterwards
    #[serde(with = "watermark_time")]
    pub initial_value: DateTime<Utc>,

    /// Upper bound of the most recently completed run
    #[serde(with = "watermark_time")]
    pub last_value: DateTime<Utc>,

    /// Identifiers of records sitting exactly on the boundary of the last run
    #[serde(default)]
    pub unique_hashes: BTreeSet<String>,

    /// When this record was written
    #[serde(with = "watermark_time")]
    pub run_created_at: DateTime<Utc>,
}

impl Watermark {
    /// Watermark for a resource that has never been synced
    pub fn first(
        initial_value: DateTime<Utc>,
        upper_bound: DateTime<Utc>,
        run_created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            initial_value,
            last_value: upper_bound.max(initial_value),
            unique_hashes: BTreeSet::new(),
            run_created_at,
        }
    }

    /// Successor of this watermark after a completed run.
    ///
    /// `last_value` only moves forward; `initial_value` is carried over.
    #[must_use]
    pub fn advance(
        &self,
        upper_bound: DateTime<Utc>,
        unique_hashes: BTreeSet<String>,
        run_created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            initial_value: self.initial_value,
            last_value: self.last_value.max(upper_bound),
            unique_hashes,
            run_created_at,
        }
    }

    /// Set the boundary identifiers
    #[must_use]
    pub fn with_unique_hashes(mut self, unique_hashes: BTreeSet<String>) -> Self {
        self.unique_hashes = unique_hashes;
        self
    }
}
