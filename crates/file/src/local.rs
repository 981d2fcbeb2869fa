//! Local filesystem object store implementation

use crate::ObjectStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Object store backed by a local directory
///
/// Object `key` in `bucket` lives at `root/bucket/key`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an object
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    async fn open(&self, bucket: &str, key: &str) -> Result<tokio::fs::File> {
        let path = self.object_path(bucket, key);
        tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("Failed to open file: {}", path.display()))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let path = self.object_path(bucket, key);
        let contents = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        Ok(Bytes::from(contents))
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<Bytes> {
        if range.end < range.start {
            anyhow::bail!("Invalid byte range {}..{}", range.start, range.end);
        }
        let mut file = self.open(bucket, key).await?;
        file.seek(std::io::SeekFrom::Start(range.start)).await?;

        let mut buf = vec![0u8; (range.end - range.start) as usize];
        file.read_exact(&mut buf).await.with_context(|| {
            format!(
                "Failed to read bytes {}..{} of {}",
                range.start,
                range.end,
                self.object_path(bucket, key).display()
            )
        })?;
        Ok(Bytes::from(buf))
    }

    async fn size(&self, bucket: &str, key: &str) -> Result<u64> {
        let path = self.object_path(bucket, key);
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Failed to get metadata for: {}", path.display()))?;
        Ok(metadata.len())
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: &mut tokio::fs::File,
    ) -> Result<u64> {
        let mut src = self.open(bucket, key).await?;
        let written = tokio::io::copy(&mut src, dest).await?;
        dest.flush().await?;

        tracing::debug!(
            "Copied {} bytes from {}",
            written,
            self.object_path(bucket, key).display()
        );

        Ok(written)
    }
}
