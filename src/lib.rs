// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # shopify-sync
//!
//! Incremental extraction of Shopify Admin REST resources.
//!
//! Each run pulls the records updated between the resource's stored
//! watermark and "now", pages through `Link` headers, hands every page to a
//! sink, and only then advances the watermark. A run that fails anywhere
//! before the commit leaves the watermark untouched, so the next run replays
//! the same window.
//!
//! ## Features
//!
//! - **Rate limiting**: Sliding-window limiter shared by every request
//! - **Link header pagination**: Follows `rel="next"` cursors verbatim
//! - **Durable watermarks**: Local or object-store backed, retried with jittered backoff
//! - **Resource registry**: Built-in `customers` and `orders`, extensible from YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shopify_sync::cli::build_engine;
//! use shopify_sync::config::Settings;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> shopify_sync::Result<()> {
//!     let settings = Settings::from_file("shopify-sync.yaml")?;
//!     let registry = Arc::new(settings.registry()?);
//!     let engine = build_engine(&settings, registry)?;
//!
//!     let report = engine
//!         .sync_resource("orders", &CancellationToken::new())
//!         .await?;
//!     println!("{} records, watermark {}", report.records, report.watermark.last_value);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SyncEngine                           │
//! │  load watermark → open window → drain pages → commit         │
//! └──────────────────────────────────────────────────────────────┘
//!          │                    │                      │
//! ┌────────┴───────┐  ┌─────────┴────────┐  ┌──────────┴─────────┐
//! │ WatermarkStore │  │   PageFetcher    │  │        Sink        │
//! ├────────────────┤  ├──────────────────┤  ├────────────────────┤
//! │ KvStore        │  │ HttpClient       │  │ JSONL + manifest   │
//! │ Retry/backoff  │  │ RateLimiter      │  │ Memory (tests)     │
//! └────────────────┘  └──────────────────┘  └────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and timestamp formats
pub mod types;

/// Retry policy with exponential backoff and jitter
pub mod retry;

/// Object store locations (local, S3, R2, GCS, Azure)
pub mod storage;

/// HTTP client with retry and rate limiting
pub mod http;

/// Link header pagination
pub mod pagination;

/// Watermark persistence
pub mod state;

/// Resource definitions
pub mod registry;

/// Record delivery
pub mod sink;

/// Incremental sync engine
pub mod engine;

/// Settings file
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, FailureKind, Result};
pub use types::*;

// Re-export commonly used types
pub use engine::{SyncEngine, SyncReport};
pub use registry::{ResourceDefinition, ResourceRegistry};
pub use state::{Watermark, WatermarkStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
