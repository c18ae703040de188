//! Configuration for sync runs
//!
//! Settings are loaded once from YAML and passed explicitly to the
//! components that need them. `${VAR}` placeholders are expanded from the
//! environment before parsing, and `SHOPIFY_ACCESS_TOKEN` always wins over
//! the token in the file.

use crate::engine::SyncConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::registry::{ResourceDefinition, ResourceRegistry};
use crate::retry::RetryPolicy;
use crate::state::DEFAULT_NAMESPACE;
use crate::types::{parse_timestamp, OptionStringExt};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

/// Environment variable overriding `shop.access_token`
pub const ACCESS_TOKEN_ENV: &str = "SHOPIFY_ACCESS_TOKEN";

/// Largest page Shopify serves
pub const MAX_PAGE_LIMIT: u32 = 250;

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Upstream shop
    pub shop: ShopConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Call budget shared by all resources
    #[serde(default)]
    pub rate_limit: RateLimiterConfig,

    /// Where watermarks live
    #[serde(default)]
    pub store: StoreConfig,

    /// Root of the JSON-lines output (local path or object store URL)
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Lower bound for resources that were never synced
    pub start_date: String,

    /// Resources to sync; empty means every registered resource
    #[serde(default)]
    pub resources: Vec<String>,

    /// Additional or overriding resource definitions
    #[serde(default)]
    pub extra_resources: Vec<ResourceDefinition>,
}

fn default_destination() -> String {
    "./output".to_string()
}

// ============================================================================
// Shop Config
// ============================================================================

/// Shop connection details
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopConfig {
    /// Shop name, as in `{name}.myshopify.com`
    #[serde(default)]
    pub name: Option<String>,

    /// Full API base URL; takes precedence over `name`
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Admin API access token
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Records per page (`limit`); upstream default if unset
    #[serde(default)]
    pub page_limit: Option<u32>,
}

fn default_api_version() -> String {
    "2023-07".to_string()
}

// ============================================================================
// HTTP Config
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per request for transport failures, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

// ============================================================================
// Store Config
// ============================================================================

/// Watermark store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Local path or object store URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Key prefix, keys are `{namespace}_{resource}`
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Attempts per store call for transient failures
    #[serde(default = "default_store_attempts")]
    pub max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            namespace: default_namespace(),
            max_attempts: default_store_attempts(),
        }
    }
}

fn default_store_url() -> String {
    "./state".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_store_attempts() -> u32 {
    8
}

// ============================================================================
// Loading
// ============================================================================

impl Settings {
    /// Load settings from a YAML file using the process environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Parse settings using the process environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_env(yaml, |name| std::env::var(name).ok())
    }

    /// Parse settings, resolving environment variables through `lookup`
    pub fn from_yaml_with_env<F>(yaml: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(yaml, &lookup)?;
        let mut settings: Settings = serde_yaml::from_str(&expanded)?;

        if let Some(token) = lookup(ACCESS_TOKEN_ENV).none_if_empty() {
            settings.shop.access_token = Some(token);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check settings for missing or out-of-range values
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.access_token().is_none() {
            return Err(Error::missing_field("shop.access_token"));
        }

        if let Some(limit) = self.shop.page_limit {
            if limit == 0 || limit > MAX_PAGE_LIMIT {
                return Err(Error::invalid_value(
                    "shop.page_limit",
                    format!("must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"),
                ));
            }
        }

        parse_timestamp(&self.start_date)
            .map_err(|e| Error::invalid_value("start_date", e.to_string()))?;

        if self.rate_limit.max_calls == 0 {
            return Err(Error::invalid_value("rate_limit.max_calls", "must be positive"));
        }
        if self.rate_limit.period_secs == 0 {
            return Err(Error::invalid_value("rate_limit.period_secs", "must be positive"));
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::invalid_value("http.timeout_secs", "must be positive"));
        }
        if self.store.namespace.trim().is_empty() {
            return Err(Error::invalid_value("store.namespace", "must not be empty"));
        }

        self.registry()?;
        Ok(())
    }

    // ========================================================================
    // Derived values
    // ========================================================================

    /// API base URL: `base_url`, or `https://{name}.myshopify.com/admin/api/{api_version}`
    pub fn base_url(&self) -> Result<String> {
        let raw = match (&self.shop.base_url, &self.shop.name) {
            (Some(base_url), _) if !base_url.trim().is_empty() => {
                base_url.trim().trim_end_matches('/').to_string()
            }
            (_, Some(name)) if !name.trim().is_empty() => format!(
                "https://{}.myshopify.com/admin/api/{}",
                name.trim(),
                self.shop.api_version
            ),
            _ => return Err(Error::missing_field("shop.name")),
        };

        url::Url::parse(&raw)?;
        Ok(raw)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.shop
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn start_date(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.start_date)
    }

    /// Built-in resources plus `extra_resources`
    pub fn registry(&self) -> Result<ResourceRegistry> {
        let mut registry = ResourceRegistry::builtin()?;
        for definition in &self.extra_resources {
            registry.register(definition.clone())?;
        }

        for name in &self.resources {
            registry.get(name)?;
        }
        Ok(registry)
    }

    /// Resources to sync: the configured list, or everything registered
    pub fn selected_resources(&self, registry: &ResourceRegistry) -> Vec<String> {
        if self.resources.is_empty() {
            registry.names()
        } else {
            self.resources.clone()
        }
    }

    pub fn sync_config(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::new(self.start_date()?);
        config.page_limit = self.shop.page_limit;
        Ok(config)
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .retry(RetryPolicy::new(
                self.http.max_retries,
                Duration::from_millis(self.http.initial_backoff_ms),
                Duration::from_millis(self.http.max_backoff_ms),
            ));
        if let Some(token) = self.access_token() {
            builder = builder.access_token(token);
        }
        builder.build()
    }

    /// Retry policy for the watermark store
    pub fn store_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.store.max_attempts.max(1),
            ..RetryPolicy::default()
        }
    }
}

/// Matches `${NAME}` environment placeholders
static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}").expect("valid placeholder pattern")
});

/// Replace `${NAME}` placeholders with values from `lookup`
fn expand_env_vars<F>(input: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(input.len());
    let mut last = 0;

    for caps in ENV_PLACEHOLDER.captures_iter(input) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = lookup(name.as_str()).ok_or_else(|| {
            Error::config(format!("Environment variable '{}' is not set", name.as_str()))
        })?;

        output.push_str(&input[last..whole.start()]);
        output.push_str(&value);
        last = whole.end();
    }

    output.push_str(&input[last..]);
    Ok(output)
}
