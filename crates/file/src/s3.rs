//! S3 object store implementation

use crate::ObjectStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use bytes::Bytes;
use std::ops::Range;
use tokio::io::AsyncWriteExt;

/// Shared S3 client for efficient operations
///
/// Creating an S3 client is relatively expensive, so this struct allows
/// reusing the client across multiple operations.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Create a new S3 client from AWS config
    ///
    /// Region, credentials and endpoint come from the standard AWS environment
    /// (`AWS_REGION`, `AWS_ENDPOINT_URL`, profiles, ...).
    pub async fn new() -> Result<Self> {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

/// Format a half-open range as an HTTP `Range` header value
fn range_header(range: &Range<u64>) -> Result<String> {
    if range.end <= range.start {
        anyhow::bail!("Invalid byte range {}..{}", range.start, range.end);
    }
    Ok(format!("bytes={}-{}", range.start, range.end - 1))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch object from S3: s3://{bucket}/{key}"))?;

        let data = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read object body: s3://{bucket}/{key}"))?;

        Ok(data.into_bytes())
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> Result<Bytes> {
        if range.start == range.end {
            return Ok(Bytes::new());
        }

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .range(range_header(&range)?)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch bytes {}..{} from S3: s3://{bucket}/{key}",
                    range.start, range.end
                )
            })?;

        let data = response
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read object body: s3://{bucket}/{key}"))?;

        Ok(data.into_bytes())
    }

    async fn size(&self, bucket: &str, key: &str) -> Result<u64> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to stat object in S3: s3://{bucket}/{key}"))?;

        let length = response
            .content_length()
            .with_context(|| format!("S3 returned no content length for s3://{bucket}/{key}"))?;

        u64::try_from(length)
            .with_context(|| format!("Negative content length {length} for s3://{bucket}/{key}"))
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: &mut tokio::fs::File,
    ) -> Result<u64> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch object from S3: s3://{bucket}/{key}"))?;

        // Convert byte stream to async read
        let mut stream = response.body.into_async_read();

        let written = tokio::io::copy(&mut stream, dest)
            .await
            .with_context(|| format!("Failed to download s3://{bucket}/{key}"))?;
        dest.flush().await?;

        tracing::debug!("Downloaded {} bytes from s3://{}/{}", written, bucket, key);

        Ok(written)
    }
}
