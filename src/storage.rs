//! Object storage locations (local, S3, R2, GCS, Azure)
//!
//! Both the watermark store and the JSON-lines sink persist through
//! `object_store`; this module turns a location URL into a store plus a key
//! prefix inside it.

use crate::error::{Error, Result};
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

/// A store plus a prefix within it
#[derive(Debug, Clone)]
pub struct ObjectLocation {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    scheme: String,
}

impl ObjectLocation {
    /// Parse a location URL and create the matching object store
    ///
    /// Supported formats:
    /// - `s3://bucket/path/` - AWS S3
    /// - `r2://bucket/path/` - Cloudflare R2 (S3-compatible)
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `az://container/path/` - Azure Blob Storage
    /// - `memory://` - process-local, for tests and dry runs
    /// - `/local/path/` or `./path/` - Local filesystem
    pub fn parse(url: &str) -> Result<Self> {
        if url.starts_with("s3://") {
            Self::parse_s3(url, false)
        } else if url.starts_with("r2://") {
            Self::parse_s3(url, true)
        } else if url.starts_with("gs://") {
            Self::parse_gcs(url)
        } else if url.starts_with("az://") {
            Self::parse_azure(url)
        } else if url.starts_with("memory://") {
            Ok(Self::in_memory())
        } else {
            Self::parse_local(url)
        }
    }

    /// Wrap an existing store
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            scheme: scheme.into(),
        }
    }

    /// A fresh in-memory location
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "", "memory")
    }

    fn parse_s3(url: &str, is_r2: bool) -> Result<Self> {
        let scheme = if is_r2 { "r2" } else { "s3" };
        let (bucket, prefix) = split_bucket(url, scheme)?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        // R2 endpoint: https://<account_id>.r2.cloudflarestorage.com
        if is_r2 {
            if let Ok(endpoint) = std::env::var("R2_ENDPOINT_URL") {
                builder = builder.with_endpoint(endpoint);
            }
        }

        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create {scheme} client: {e}")))?;

        Ok(Self::new(Arc::new(store), prefix, scheme))
    }

    fn parse_gcs(url: &str) -> Result<Self> {
        let (bucket, prefix) = split_bucket(url, "gs")?;

        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self::new(Arc::new(store), prefix, "gs"))
    }

    fn parse_azure(url: &str) -> Result<Self> {
        let (container, prefix) = split_bucket(url, "az")?;

        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()
            .map_err(|e| Error::config(format!("Failed to create Azure client: {e}")))?;

        Ok(Self::new(Arc::new(store), prefix, "az"))
    }

    fn parse_local(path: &str) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);

        std::fs::create_dir_all(path)
            .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self::new(Arc::new(store), "", "file"))
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Get the scheme (s3, r2, gs, az, memory, file)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Check if this is a remote location
    pub fn is_cloud(&self) -> bool {
        !matches!(self.scheme.as_str(), "file" | "memory")
    }

    /// Full object path for a name under this location's prefix
    pub fn path(&self, name: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(name)
        } else {
            ObjectPath::from(format!("{}/{name}", self.prefix.trim_end_matches('/')))
        }
    }

    /// Human-readable URL of an object, for logging
    pub fn display(&self, path: &ObjectPath) -> String {
        format!("{}://{path}", self.scheme)
    }
}

fn split_bucket(url: &str, scheme: &str) -> Result<(String, String)> {
    let without_scheme = url
        .strip_prefix(&format!("{scheme}://"))
        .ok_or_else(|| Error::config(format!("Invalid {scheme} URL: {url}")))?;

    let (bucket, prefix) = match without_scheme.find('/') {
        Some(idx) => (&without_scheme[..idx], &without_scheme[idx + 1..]),
        None => (without_scheme, ""),
    };

    if bucket.is_empty() {
        return Err(Error::config(format!("Missing bucket in {scheme} URL: {url}")));
    }

    Ok((bucket.to_string(), prefix.trim_end_matches('/').to_string()))
}
