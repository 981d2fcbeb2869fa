//! Reader for Parquet inventory files, streamed straight from the object store.

use crate::error::{InventoryError, Result};
use crate::manifest::InventoryFormat;
use crate::object::{InventoryColumns, InventoryObject, INVENTORY_COLUMNS};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parquet::arrow::async_reader::{
    AsyncFileReader, ParquetRecordBatchStream, ParquetRecordBatchStreamBuilder,
};
use parquet::arrow::ProjectionMask;
use parquet::errors::ParquetError;
use parquet::file::metadata::{ParquetMetaData, ParquetMetaDataReader};
use s3_inventory_file::ObjectStore;
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

/// Parquet footer: 4-byte metadata length followed by the `PAR1` magic.
const FOOTER_SIZE: usize = 8;

/// A Parquet object read through ranged requests.
pub struct RemoteParquetFile {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    size: u64,
}

impl RemoteParquetFile {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str, key: &str, size: u64) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
        }
    }

    async fn fetch(&self, range: Range<u64>) -> parquet::errors::Result<Bytes> {
        self.store
            .get_range(&self.bucket, &self.key, range)
            .await
            .map_err(|e| ParquetError::External(e.into()))
    }
}

impl AsyncFileReader for RemoteParquetFile {
    fn get_bytes(&mut self, range: Range<usize>) -> BoxFuture<'_, parquet::errors::Result<Bytes>> {
        async move { self.fetch(range.start as u64..range.end as u64).await }.boxed()
    }

    fn get_metadata(&mut self) -> BoxFuture<'_, parquet::errors::Result<Arc<ParquetMetaData>>> {
        async move {
            let footer_start = self.size.checked_sub(FOOTER_SIZE as u64).ok_or_else(|| {
                ParquetError::EOF(format!(
                    "{} is {} bytes, too small for a Parquet footer",
                    self.key, self.size
                ))
            })?;

            let footer = self.fetch(footer_start..self.size).await?;
            let footer: [u8; FOOTER_SIZE] = footer[..]
                .try_into()
                .map_err(|_| ParquetError::EOF(format!("Short footer read for {}", self.key)))?;
            let metadata_len = ParquetMetaDataReader::decode_footer(&footer)?;

            let metadata_start = footer_start
                .checked_sub(metadata_len as u64)
                .ok_or_else(|| {
                    ParquetError::EOF(format!(
                        "Metadata length {metadata_len} exceeds size of {}",
                        self.key
                    ))
                })?;
            let metadata = self.fetch(metadata_start..footer_start).await?;

            Ok(Arc::new(ParquetMetaDataReader::decode_metadata(&metadata)?))
        }
        .boxed()
    }
}

/// Streaming batch reader over a remote Parquet file.
pub struct ParquetManifestFileReader {
    key: String,
    stream: ParquetRecordBatchStream<RemoteParquetFile>,
    /// Rows decoded from the last record batch and not yet handed out.
    pending: VecDeque<InventoryObject>,
}

impl ParquetManifestFileReader {
    /// Open `key` in `bucket`, reading only the footer up front.
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        key: &str,
        batch_size: usize,
    ) -> Result<Self> {
        let size = store
            .size(bucket, key)
            .await
            .map_err(|source| InventoryError::Transport {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;

        let decode_open = |e: ParquetError| InventoryError::DecodeOpen {
            format: InventoryFormat::Parquet,
            key: key.to_string(),
            source: e.into(),
        };

        let file = RemoteParquetFile::new(store, bucket, key, size);
        let builder = ParquetRecordBatchStreamBuilder::new(file)
            .await
            .map_err(decode_open)?;

        let indices: Vec<usize> = INVENTORY_COLUMNS
            .iter()
            .filter_map(|name| builder.schema().index_of(name).ok())
            .collect();
        let projection = ProjectionMask::roots(builder.parquet_schema(), indices);

        let stream = builder
            .with_projection(projection)
            .with_batch_size(batch_size.max(1))
            .build()
            .map_err(decode_open)?;

        tracing::debug!("Opened Parquet stream for s3://{}/{} ({} bytes)", bucket, key, size);

        Ok(Self {
            key: key.to_string(),
            stream,
            pending: VecDeque::new(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fill `batch` with the next objects.
    ///
    /// Returns the number of objects written; fewer than `batch.len()` means
    /// the file is exhausted.
    pub async fn read(&mut self, batch: &mut [InventoryObject]) -> Result<usize> {
        let mut filled = 0;
        while filled < batch.len() {
            if let Some(object) = self.pending.pop_front() {
                batch[filled] = object;
                filled += 1;
                continue;
            }

            match self.stream.next().await {
                Some(Ok(record_batch)) => {
                    let columns = InventoryColumns::from_batch(&record_batch)
                        .map_err(|source| self.decode_error(source))?;
                    self.pending.extend(columns.objects());
                }
                Some(Err(e)) => return Err(self.decode_error(e.into())),
                None => break,
            }
        }
        Ok(filled)
    }

    /// Stop the stream and release its handle.
    pub fn close(self) -> Result<()> {
        tracing::debug!("Closing Parquet stream for {}", self.key);
        drop(self.stream);
        Ok(())
    }

    fn decode_error(&self, source: anyhow::Error) -> InventoryError {
        InventoryError::Decode {
            key: self.key.clone(),
            source,
        }
    }
}
