//! Error types for shopify-sync
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every error maps onto a [`FailureKind`] so a failed resource run can report
//! whether the upstream rejected the request, the network was unreachable, or
//! the watermark store was unavailable.

use std::fmt;
use thiserror::Error;

/// The main error type for shopify-sync
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Resource '{name}' is not registered")]
    ResourceNotFound { name: String },

    // ============================================================================
    // Upstream Errors
    // ============================================================================
    /// Non-2xx response, or a transport failure that outlived its retries
    /// (`status` is `None` in that case).
    #[error("{}", describe_fetch(.status, .endpoint, .message))]
    Fetch {
        status: Option<u16>,
        endpoint: String,
        message: String,
    },

    #[error("Malformed response from '{endpoint}': {message}")]
    MalformedResponse { endpoint: String, message: String },

    // ============================================================================
    // Watermark Store Errors
    // ============================================================================
    #[error("Watermark store unavailable for key '{key}' after {attempts} attempt(s): {message}")]
    FatalStore {
        key: String,
        attempts: u32,
        message: String,
    },

    #[error("Stored watermark under '{key}' could not be decoded: {message}")]
    CorruptWatermark { key: String, message: String },

    // ============================================================================
    // Run Errors
    // ============================================================================
    #[error("Sync window for '{resource}' is empty: lower bound {lower} is after upper bound {upper}")]
    InvalidWindow {
        resource: String,
        lower: String,
        upper: String,
    },

    #[error("Sync of '{resource}' was cancelled")]
    Cancelled { resource: String },

    #[error("Sink rejected data for '{resource}': {message}")]
    Sink { resource: String, message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

fn describe_fetch(status: &Option<u16>, endpoint: &str, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP {status} from '{endpoint}': {message}"),
        None => format!("Could not reach '{endpoint}': {message}"),
    }
}

/// Coarse classification of a failed run, for operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network unreachable or timed out after retries
    Connectivity,
    /// Upstream answered with a non-2xx status or an unusable body
    UpstreamRejected,
    /// Watermark store could not be read or written
    StoreUnavailable,
    /// Sink failed to accept data
    Sink,
    /// Run was aborted by the caller
    Cancelled,
    /// Bad configuration or input
    Configuration,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connectivity => "connectivity",
            Self::UpstreamRejected => "upstream-rejected",
            Self::StoreUnavailable => "store-unavailable",
            Self::Sink => "sink",
            Self::Cancelled => "cancelled",
            Self::Configuration => "configuration",
        };
        f.write_str(label)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an error for a non-2xx response
    pub fn http_status(status: u16, endpoint: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Fetch {
            status: Some(status),
            endpoint: endpoint.into(),
            message: body.into(),
        }
    }

    /// Create an error for a transport failure
    pub fn unreachable(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            status: None,
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a sink error
    pub fn sink(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(resource: impl Into<String>) -> Self {
        Self::Cancelled {
            resource: resource.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Fetch { status: None, .. } => FailureKind::Connectivity,
            Error::Fetch { .. } | Error::MalformedResponse { .. } => FailureKind::UpstreamRejected,
            Error::FatalStore { .. } | Error::CorruptWatermark { .. } => {
                FailureKind::StoreUnavailable
            }
            Error::Sink { .. } | Error::Io(_) => FailureKind::Sink,
            Error::Cancelled { .. } => FailureKind::Cancelled,
            _ => FailureKind::Configuration,
        }
    }

    /// HTTP status of an upstream rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type alias for shopify-sync
pub type Result<T> = std::result::Result<T, Error>;
