//! Inventory manifest: the format tag, the bucket holding the data files and
//! the ordered list of data-file keys.

use crate::error::{InventoryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const BUCKET_ARN_PREFIX: &str = "arn:aws:s3:::";

/// Data-file formats with a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryFormat {
    /// Read directly from the store with ranged requests.
    Parquet,
    /// Downloaded to a local temporary file before decoding.
    Orc,
}

impl InventoryFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            InventoryFormat::Parquet => "Parquet",
            InventoryFormat::Orc => "ORC",
        }
    }
}

impl fmt::Display for InventoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryFormat {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("parquet") {
            Ok(InventoryFormat::Parquet)
        } else if s.eq_ignore_ascii_case("orc") {
            Ok(InventoryFormat::Orc)
        } else {
            Err(InventoryError::UnsupportedFormat(s.to_string()))
        }
    }
}

/// One data file listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(
        rename = "MD5checksum",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub md5_checksum: Option<String>,
}

impl ManifestFile {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            md5_checksum: None,
        }
    }
}

/// An inventory manifest.
///
/// The format is kept as the raw string found in the manifest; it is only
/// interpreted when a reader is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub format: String,
    pub inventory_bucket: String,
    pub files: Vec<ManifestFile>,
    pub source_bucket: Option<String>,
}

/// `manifest.json` as written by S3 Inventory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    source_bucket: Option<String>,
    destination_bucket: String,
    file_format: String,
    #[serde(default)]
    files: Vec<ManifestFile>,
}

impl Manifest {
    pub fn new(
        format: impl Into<String>,
        inventory_bucket: impl Into<String>,
        files: Vec<ManifestFile>,
    ) -> Self {
        Self {
            format: format.into(),
            inventory_bucket: inventory_bucket.into(),
            files,
            source_bucket: None,
        }
    }

    /// Parse an S3 Inventory `manifest.json` document.
    ///
    /// `destinationBucket` may be a bucket ARN or a plain bucket name.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(data)
            .map_err(|e| InventoryError::InvalidManifest(e.to_string()))?;

        let inventory_bucket = raw
            .destination_bucket
            .strip_prefix(BUCKET_ARN_PREFIX)
            .unwrap_or(&raw.destination_bucket)
            .to_string();
        if inventory_bucket.is_empty() {
            return Err(InventoryError::InvalidManifest(
                "destinationBucket is empty".to_string(),
            ));
        }

        Ok(Self {
            format: raw.file_format,
            inventory_bucket,
            files: raw.files,
            source_bucket: raw.source_bucket,
        })
    }

    /// The declared file format, or `UnsupportedFormat`.
    pub fn file_format(&self) -> Result<InventoryFormat> {
        self.format.parse()
    }

    /// Position of `key` in the file list.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.files.iter().position(|f| f.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.key.as_str())
    }
}
