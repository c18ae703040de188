//! HTTP client module
//!
//! Provides the HTTP client used for every upstream call.
//!
//! # Features
//!
//! - **Rate Limiting**: Sliding-window limiter shared across all resources
//! - **Automatic Retries**: Transport failures retried with backoff and jitter
//! - **Authentication**: Shopify access token sent as a default header

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, ACCESS_TOKEN_HEADER};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
