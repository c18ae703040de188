//! HTTP client with retry and rate limiting
//!
//! Provides the HTTP client every upstream call goes through:
//! - A shared sliding-window rate limiter acquired before each attempt
//! - A mandatory per-request timeout
//! - Bounded retries with backoff for transport failures only
//! - Non-2xx responses surfaced as errors without retrying

use super::rate_limit::RateLimiter;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::QueryParams;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the Shopify Admin API access token
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Retry policy for transport failures
    pub retry: RetryPolicy,
    /// Default headers for all requests
    pub default_headers: Vec<(String, String)>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::new(3, Duration::from_millis(250), Duration::from_secs(10)),
            default_headers: Vec::new(),
            user_agent: format!("shopify-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the retry policy for transport failures
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((key.into(), value.into()));
        self
    }

    /// Authenticate with a Shopify access token
    pub fn access_token(self, token: impl Into<String>) -> Self {
        self.header(ACCESS_TOKEN_HEADER, token)
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl HttpClient {
    /// Create a client drawing from the given shared rate limiter
    pub fn new(config: HttpClientConfig, rate_limiter: Arc<RateLimiter>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.default_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::invalid_value("http.headers", format!("{key}: {e}")))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| Error::invalid_value("http.headers", format!("{key}: {e}")))?;
            if key.eq_ignore_ascii_case(ACCESS_TOKEN_HEADER) {
                value.set_sensitive(true);
            }
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// The shared rate limiter
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Issue a GET, returning the response only if it is 2xx.
    ///
    /// `endpoint` names the logical resource for error reporting. `query` is
    /// appended as-is; pass `None` to request `url` verbatim.
    pub async fn get(
        &self,
        endpoint: &str,
        url: &str,
        query: Option<&QueryParams>,
    ) -> Result<Response> {
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.rate_limiter.acquire().await;

            let mut req = self.client.get(url);
            if let Some(query) = query {
                req = req.query(query);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!("GET {url} -> {}", status.as_u16());
                        return Ok(response);
                    }

                    let body = response.text().await.unwrap_or_default();
                    warn!(
                        endpoint,
                        status = status.as_u16(),
                        "upstream rejected request"
                    );
                    return Err(Error::http_status(status.as_u16(), endpoint, body));
                }
                Err(e) if is_transient(&e) && policy.should_retry(attempt) => {
                    let delay = policy.delay_for(attempt - 1);
                    warn!(
                        "Transport error on {endpoint}, attempt {attempt}/{}, retrying in {delay:?}: {e}",
                        policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(Error::unreachable(
                        endpoint,
                        format!("{e} (after {attempt} attempt(s))"),
                    ));
                }
            }
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("timeout", &self.config.timeout)
            .field("retry", &self.config.retry)
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

/// Timeouts and connection failures are worth another attempt
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_request()
}
