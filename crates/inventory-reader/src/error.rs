//! Error types for inventory manifest reading.
//!
//! Read exhaustion is not an error: `read` returns `Ok(n)` with `n` smaller
//! than the batch. Skip exhaustion is: `skip_rows` fails with
//! [`InventoryError::InsufficientRows`].

use crate::manifest::InventoryFormat;
use thiserror::Error;

/// Errors returned by the manifest reader factory and its readers.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The manifest declares a file format with no reader.
    #[error("Unsupported inventory format: {0}")]
    UnsupportedFormat(String),

    /// The manifest document could not be parsed.
    #[error("Invalid inventory manifest: {0}")]
    InvalidManifest(String),

    /// Fetching or opening a remote object failed.
    #[error("Failed to fetch s3://{bucket}/{key}")]
    Transport {
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The download was aborted through the reader's cancellation token.
    #[error("Download of s3://{bucket}/{key} was cancelled")]
    Cancelled { bucket: String, key: String },

    /// A decoder could not open the file it was given.
    #[error("Failed to open {format} decoder for {key}")]
    DecodeOpen {
        format: InventoryFormat,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Decoding records from an opened file failed.
    #[error("Failed to decode inventory records from {key}")]
    Decode {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// `skip_rows` ran out of rows before skipping the requested count.
    #[error("No more rows to skip in {key}: requested {requested}, skipped {skipped}")]
    InsufficientRows {
        key: String,
        requested: i64,
        skipped: i64,
    },

    /// Releasing a reader's resources failed.
    #[error("Failed to release {key}")]
    Cleanup {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for inventory reading.
pub type Result<T> = std::result::Result<T, InventoryError>;
