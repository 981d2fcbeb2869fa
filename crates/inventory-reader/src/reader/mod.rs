//! Per-format manifest file readers behind one batch-read interface.

pub mod orc;
mod orc_file;
pub mod parquet;

pub use self::orc::{OrcManifestFileReader, StripeCursor, StripeFile, StripeFileOpener};
pub use self::orc_file::OrcFileOpener;
pub use self::parquet::{ParquetManifestFileReader, RemoteParquetFile};

use crate::error::Result;
use crate::manifest::InventoryFormat;
use crate::object::InventoryObject;

/// Reader for one data file of an inventory.
///
/// `read` fills a caller-owned buffer and signals exhaustion by filling fewer
/// slots than it has. ORC readers additionally support row skipping and row
/// counts through [`ManifestFileReader::as_materialized_mut`].
pub enum ManifestFileReader {
    Parquet(ParquetManifestFileReader),
    Orc(OrcManifestFileReader),
}

impl ManifestFileReader {
    pub fn format(&self) -> InventoryFormat {
        match self {
            ManifestFileReader::Parquet(_) => InventoryFormat::Parquet,
            ManifestFileReader::Orc(_) => InventoryFormat::Orc,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            ManifestFileReader::Parquet(reader) => reader.key(),
            ManifestFileReader::Orc(reader) => reader.key(),
        }
    }

    /// Fill `batch`, returning how many objects were written.
    pub async fn read(&mut self, batch: &mut [InventoryObject]) -> Result<usize> {
        match self {
            ManifestFileReader::Parquet(reader) => reader.read(batch).await,
            ManifestFileReader::Orc(reader) => reader.read(batch),
        }
    }

    /// Read everything that is left, `batch_size` objects at a time.
    pub async fn read_to_end(&mut self, batch_size: usize) -> Result<Vec<InventoryObject>> {
        let mut batch = vec![InventoryObject::default(); batch_size.max(1)];
        let mut objects = Vec::new();
        loop {
            let filled = self.read(&mut batch).await?;
            objects.extend(batch[..filled].iter().cloned());
            if filled < batch.len() {
                return Ok(objects);
            }
        }
    }

    /// The ORC reader, for row skipping and row counts.
    pub fn as_materialized_mut(&mut self) -> Option<&mut OrcManifestFileReader> {
        match self {
            ManifestFileReader::Orc(reader) => Some(reader),
            ManifestFileReader::Parquet(_) => None,
        }
    }

    pub fn close(self) -> Result<()> {
        match self {
            ManifestFileReader::Parquet(reader) => reader.close(),
            ManifestFileReader::Orc(reader) => reader.close(),
        }
    }
}
