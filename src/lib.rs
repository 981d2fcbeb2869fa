//! s3-inventory library
//!
//! Command-line plumbing around the inventory manifest reader: options,
//! manifest loading and the commands behind the `s3-inventory` binary.
//!
//! # Crates
//!
//! - `s3_inventory_file` - object store access (S3 and local directories)
//! - `s3_inventory_reader` - Parquet and ORC manifest file readers
//!
//! # CLI Usage
//!
//! ```bash
//! # List the data files of an inventory
//! s3-inventory files --manifest s3://inventory-bucket/source/config/2024-01-01T01-00Z/manifest.json
//!
//! # Print every listed object as a JSON line
//! s3-inventory dump --manifest s3://inventory-bucket/source/config/2024-01-01T01-00Z/manifest.json
//! ```

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

pub mod dump;

pub use dump::{dump, dump_until, list_files};

// Re-export reader crates for convenience
pub use s3_inventory_file as file;
pub use s3_inventory_reader as reader;

use s3_inventory_file::{FileSource, LocalObjectStore, ObjectStore, S3ObjectStore};
use s3_inventory_reader::{Manifest, ReaderConfig, DEFAULT_BATCH_SIZE};

#[derive(Parser, Clone, Debug)]
pub struct InventoryOpts {
    /// Read objects from this directory (laid out as <root>/<bucket>/<key>) instead of S3
    #[arg(long, value_name = "DIR", env = "S3_INVENTORY_LOCAL_ROOT")]
    pub local_root: Option<PathBuf>,

    /// Directory for local copies of ORC files (default: system temp dir)
    #[arg(long, value_name = "DIR", env = "S3_INVENTORY_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Number of objects read per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, env = "S3_INVENTORY_BATCH_SIZE")]
    pub batch_size: usize,
}

impl InventoryOpts {
    /// Build the object store selected by the options.
    pub async fn store(&self) -> anyhow::Result<Arc<dyn ObjectStore>> {
        match &self.local_root {
            Some(root) => Ok(Arc::new(LocalObjectStore::new(root))),
            None => Ok(Arc::new(S3ObjectStore::new().await?)),
        }
    }
}

impl From<&InventoryOpts> for ReaderConfig {
    fn from(opts: &InventoryOpts) -> Self {
        Self {
            tmp_dir: opts.tmp_dir.clone(),
            batch_size: opts.batch_size.max(1),
        }
    }
}

/// Fetch and parse the `manifest.json` at `uri` (`s3://...` or a local path).
pub async fn load_manifest(store: &dyn ObjectStore, uri: &str) -> anyhow::Result<Manifest> {
    let source = FileSource::parse(uri)?;
    let data = source
        .fetch(store)
        .await
        .with_context(|| format!("Failed to fetch manifest: {}", source.display_name()))?;

    let manifest = Manifest::from_json(&data)
        .with_context(|| format!("Failed to parse manifest: {}", source.display_name()))?;

    tracing::debug!(
        "Loaded {} manifest with {} files from {}",
        manifest.format,
        manifest.files.len(),
        source.display_name()
    );

    Ok(manifest)
}
