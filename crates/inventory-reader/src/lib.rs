//! Format-agnostic reader for S3 inventory data files
//!
//! An S3 inventory export is a manifest plus data files in Parquet or ORC.
//! [`InventoryReader`] hands out one [`ManifestFileReader`] per data file and
//! every reader yields [`InventoryObject`] records in caller-sized batches.
//!
//! # Formats
//!
//! - **Parquet**: streamed from the object store with ranged reads
//! - **ORC**: downloaded to a local temporary file first; the copy is shared
//!   by readers of the same key and deleted when its reader is closed
//!
//! # Example
//!
//! ```ignore
//! use s3_inventory_reader::{InventoryObject, InventoryReader, Manifest, ReaderConfig};
//!
//! let reader = InventoryReader::new(store, manifest, ReaderConfig::default());
//! let mut file = reader.get_manifest_file_reader(key).await?;
//! let mut batch = vec![InventoryObject::default(); 1000];
//! loop {
//!     let n = file.read(&mut batch).await?;
//!     process(&batch[..n]);
//!     if n < batch.len() {
//!         break;
//!     }
//! }
//! file.close()?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
mod factory;
pub mod manifest;
pub mod object;
pub mod reader;

pub use cache::{MaterializationCache, MaterializedFile};
pub use config::{ReaderConfig, DEFAULT_BATCH_SIZE};
pub use error::{InventoryError, Result};
pub use factory::InventoryReader;
pub use manifest::{InventoryFormat, Manifest, ManifestFile};
pub use object::InventoryObject;
pub use reader::{
    ManifestFileReader, OrcFileOpener, OrcManifestFileReader, ParquetManifestFileReader,
    StripeCursor, StripeFile, StripeFileOpener,
};

// Re-export store types for convenience
pub use s3_inventory_file::{LocalObjectStore, ObjectStore, S3ObjectStore};
