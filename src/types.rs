//! Common types used throughout shopify-sync
//!
//! This module contains shared type definitions, type aliases,
//! and the timestamp conventions used on the wire and in the store.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Ordered query parameters
pub type QueryParams = Vec<(String, String)>;

// ============================================================================
// Write Mode
// ============================================================================

/// How the sink should apply a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Merge by primary key, replacing existing rows
    #[default]
    Upsert,
    /// Append without deduplication
    Append,
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Format used for persisted watermark timestamps.
///
/// Fixed width and second precision, so stored values sort lexicographically.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way the watermark store expects
pub fn format_watermark(ts: &DateTime<Utc>) -> String {
    ts.format(WATERMARK_FORMAT).to_string()
}

/// Format a timestamp for Shopify's `updated_at_min` / `updated_at_max`
pub fn format_query_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Drop sub-second precision
pub fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Parse a user supplied timestamp.
///
/// Accepts a bare date (`2023-01-01`, midnight UTC), the watermark format
/// (`2023-01-01 12:30:00`, UTC) or RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, WATERMARK_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(Error::Other(format!("Unrecognised timestamp: '{value}'")))
}

/// Serde adapter for timestamps stored as [`WATERMARK_FORMAT`] strings
pub mod watermark_time {
    use super::{format_watermark, WATERMARK_FORMAT};
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_watermark(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, WATERMARK_FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
