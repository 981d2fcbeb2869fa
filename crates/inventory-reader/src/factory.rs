//! Reader factory: picks the reader for the manifest's format and owns the
//! local copies of materialized files.

use crate::cache::MaterializationCache;
use crate::config::ReaderConfig;
use crate::error::{InventoryError, Result};
use crate::manifest::{InventoryFormat, Manifest};
use crate::object::INVENTORY_COLUMNS;
use crate::reader::{
    ManifestFileReader, OrcFileOpener, OrcManifestFileReader, ParquetManifestFileReader,
    StripeFileOpener,
};
use s3_inventory_file::ObjectStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Hands out one reader per data file of a manifest.
///
/// Safe to share between tasks. Parquet files are streamed from the store;
/// ORC files are downloaded once into `config.tmp_dir` and reused until the
/// reader that owns the copy is closed.
pub struct InventoryReader {
    store: Arc<dyn ObjectStore>,
    manifest: Manifest,
    config: ReaderConfig,
    orc_opener: Arc<dyn StripeFileOpener>,
    cache: Arc<MaterializationCache>,
    cancel: CancellationToken,
}

impl InventoryReader {
    pub fn new(store: Arc<dyn ObjectStore>, manifest: Manifest, config: ReaderConfig) -> Self {
        let orc_opener = Arc::new(OrcFileOpener::new(config.batch_size));
        Self {
            store,
            manifest,
            config,
            orc_opener,
            cache: Arc::new(MaterializationCache::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different decoder for materialized files.
    pub fn with_stripe_opener(mut self, opener: Arc<dyn StripeFileOpener>) -> Self {
        self.orc_opener = opener;
        self
    }

    /// Abort in-flight downloads when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn cache(&self) -> &MaterializationCache {
        &self.cache
    }

    /// Open a reader for the data file `key`.
    ///
    /// The manifest format is checked before anything is fetched.
    pub async fn get_manifest_file_reader(&self, key: &str) -> Result<ManifestFileReader> {
        match self.manifest.file_format()? {
            InventoryFormat::Parquet => self
                .parquet_reader(key)
                .await
                .map(ManifestFileReader::Parquet),
            InventoryFormat::Orc => self.orc_reader(key).await.map(ManifestFileReader::Orc),
        }
    }

    async fn parquet_reader(&self, key: &str) -> Result<ParquetManifestFileReader> {
        ParquetManifestFileReader::open(
            self.store.clone(),
            &self.manifest.inventory_bucket,
            key,
            self.config.batch_size,
        )
        .await
    }

    async fn orc_reader(&self, key: &str) -> Result<OrcManifestFileReader> {
        let entry = self.cache.entry(key, self.manifest.index_of(key));
        let local_path = self
            .cache
            .materialize(&entry, || self.download(key))
            .await?;

        let opened = self.orc_opener.open(&local_path).and_then(|mut file| {
            let cursor = file.select(&INVENTORY_COLUMNS)?;
            Ok((file, cursor))
        });

        match opened {
            Ok((file, cursor)) => Ok(OrcManifestFileReader::new(
                key,
                file,
                cursor,
                self.cache.clone(),
                entry,
            )),
            Err(source) => {
                // The copy is unreadable; don't keep it around for the next request.
                if let Err(e) = self.cache.release(&entry) {
                    tracing::warn!("Failed to remove local copy of {key}: {e}");
                }
                Err(InventoryError::DecodeOpen {
                    format: InventoryFormat::Orc,
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Download `key` into a fresh temporary file and return its path.
    ///
    /// The file is deleted again unless the download completes.
    async fn download(&self, key: &str) -> Result<PathBuf> {
        let bucket = &self.manifest.inventory_bucket;
        let prefix = Path::new(key)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "inventory".to_string());

        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .tempfile_in(self.config.tmp_dir())?;
        let mut dest = tokio::fs::File::from_std(temp.reopen()?);

        tracing::debug!(
            "Start downloading {} to local file {}",
            key,
            temp.path().display()
        );

        let written = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(InventoryError::Cancelled {
                    bucket: bucket.clone(),
                    key: key.to_string(),
                });
            }
            result = self.store.download(bucket, key, &mut dest) => {
                result.map_err(|source| InventoryError::Transport {
                    bucket: bucket.clone(),
                    key: key.to_string(),
                    source,
                })?
            }
        };
        drop(dest);

        let path = temp.into_temp_path().keep().map_err(|e| e.error)?;
        tracing::debug!(
            "Finished downloading {} ({} bytes) to local file {}",
            key,
            written,
            path.display()
        );

        Ok(path)
    }
}
