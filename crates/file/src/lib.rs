//! Object store access for reading S3 inventory exports
//!
//! This crate provides a unified interface for fetching inventory objects
//! (manifests and data files) from S3 or from a local directory laid out like
//! a bucket.
//!
//! # Store Types
//!
//! - **S3**: Objects in AWS S3 (or any S3-compatible endpoint)
//! - **Local**: Objects stored under `root/<bucket>/<key>` on the local filesystem
//!
//! # Example
//!
//! ```ignore
//! use s3_inventory_file::{FileSource, ObjectStore, S3ObjectStore};
//!
//! let source = FileSource::parse("s3://inventory-bucket/src/config/2024-01-01T00-00Z/manifest.json")?;
//! let store = S3ObjectStore::new().await?;
//! let manifest_bytes = source.fetch(&store).await?;
//! ```

mod local;
mod s3;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;
use std::path::PathBuf;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

/// Remote object store accessor
///
/// All methods address an object by bucket and key. Implementations must be
/// cancel-safe: dropping a returned future aborts the request.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a whole object into memory
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Fetch the half-open byte range `range` of an object
    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<Bytes>;

    /// Size of an object in bytes
    async fn size(&self, bucket: &str, key: &str) -> Result<u64>;

    /// Copy an object into `dest`, returning the number of bytes written
    ///
    /// The destination is flushed before returning.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: &mut tokio::fs::File,
    ) -> Result<u64>;
}

/// Location of a single object, local or in S3
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Local filesystem path
    Local(PathBuf),
    /// S3 object
    S3 { bucket: String, key: String },
}

impl FileSource {
    /// Parse a string into a FileSource, auto-detecting the source type
    ///
    /// - `s3://bucket/key` -> S3
    /// - Everything else -> Local
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.starts_with("s3://") {
            let (bucket, key) = parse_s3_uri(uri)?;
            Ok(FileSource::S3 { bucket, key })
        } else {
            Ok(FileSource::Local(PathBuf::from(uri)))
        }
    }

    /// Read the whole object
    ///
    /// S3 sources go through `store`; local sources are read directly from disk.
    pub async fn fetch(&self, store: &dyn ObjectStore) -> Result<Bytes> {
        match self {
            FileSource::Local(path) => {
                let contents = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read file: {}", path.display()))?;
                Ok(Bytes::from(contents))
            }
            FileSource::S3 { bucket, key } => store.get(bucket, key).await,
        }
    }

    /// Get a display name for logging
    pub fn display_name(&self) -> String {
        match self {
            FileSource::Local(path) => path.display().to_string(),
            FileSource::S3 { bucket, key } => format!("s3://{bucket}/{key}"),
        }
    }
}

/// Parse S3 URI in the format: s3://bucket/key/to/file
pub fn parse_s3_uri(uri: &str) -> Result<(String, String)> {
    let uri = uri
        .strip_prefix("s3://")
        .context("S3 URI must start with 's3://'")?;

    let parts: Vec<&str> = uri.splitn(2, '/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        anyhow::bail!("S3 URI must be in format 's3://bucket/key/to/file'");
    }

    Ok((parts[0].to_string(), parts[1].to_string()))
}
