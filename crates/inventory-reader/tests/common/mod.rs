//! Shared fixtures for inventory reader tests.

#![allow(dead_code)]

use anyhow::Context;
use arrow::array::{
    Array, ArrayRef, Int64Array, StringArray, TimestampMillisecondArray, TimestampNanosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use orc_rust::arrow_writer::ArrowWriterBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use s3_inventory_reader::{
    InventoryObject, LocalObjectStore, ObjectStore, StripeCursor, StripeFile, StripeFileOpener,
};
use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const INVENTORY_BUCKET: &str = "inventory";

/// Initialize logging for tests
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "s3_inventory_reader=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn object(n: usize) -> InventoryObject {
    InventoryObject::new(
        "source-bucket",
        format!("data/object-{n:04}"),
        Some(n as i64 * 100),
        Some(1_700_000_000 + n as i64),
    )
}

pub fn objects(count: usize) -> Vec<InventoryObject> {
    (1..=count).map(object).collect()
}

/// Split `count` objects into stripes of the given sizes.
pub fn stripes(sizes: &[usize]) -> Vec<Vec<InventoryObject>> {
    let mut next = 0;
    sizes
        .iter()
        .map(|&size| {
            let stripe = (next + 1..=next + size).map(object).collect();
            next += size;
            stripe
        })
        .collect()
}

/// Store an object at `root/INVENTORY_BUCKET/key`.
pub fn put_object(root: &Path, key: &str, contents: &[u8]) {
    let path = root.join(INVENTORY_BUCKET).join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Store a stripe file understood by [`JsonStripeOpener`].
pub fn put_stripe_file(root: &Path, key: &str, stripes: &[Vec<InventoryObject>]) {
    put_object(root, key, &serde_json::to_vec(stripes).unwrap());
}

/// An inventory record batch with an extra `version_id` column, timestamps in
/// milliseconds or nanoseconds.
pub fn inventory_batch(objects: &[InventoryObject], unit: TimeUnit) -> RecordBatch {
    let timestamps: ArrayRef = match unit {
        TimeUnit::Nanosecond => Arc::new(TimestampNanosecondArray::from_iter(
            objects
                .iter()
                .map(|o| o.last_modified.map(|s| s * 1_000_000_000)),
        )),
        _ => Arc::new(TimestampMillisecondArray::from_iter(
            objects.iter().map(|o| o.last_modified.map(|s| s * 1000)),
        )),
    };
    let schema = Arc::new(Schema::new(vec![
        Field::new("bucket", DataType::Utf8, false),
        Field::new("key", DataType::Utf8, false),
        Field::new("version_id", DataType::Utf8, true),
        Field::new("size", DataType::Int64, true),
        Field::new(
            "last_modified_date",
            timestamps.data_type().clone(),
            true,
        ),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from_iter_values(
                objects.iter().map(|o| o.bucket.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                objects.iter().map(|o| o.key.as_str()),
            )),
            Arc::new(StringArray::from(vec![None::<&str>; objects.len()])),
            Arc::new(Int64Array::from_iter(objects.iter().map(|o| o.size))),
            timestamps,
        ],
    )
    .unwrap()
}

/// Store an ORC inventory file, writing one stripe per entry of `stripes`.
pub fn put_orc_file(root: &Path, key: &str, stripes: &[Vec<InventoryObject>]) {
    let batches: Vec<RecordBatch> = stripes
        .iter()
        .map(|objects| inventory_batch(objects, TimeUnit::Nanosecond))
        .collect();
    let schema = batches[0].schema();

    let mut buffer = Vec::new();
    // A tiny stripe size makes every write flush its own stripe.
    let mut writer = ArrowWriterBuilder::new(&mut buffer, schema)
        .with_stripe_byte_size(1)
        .try_build()
        .unwrap();
    for batch in &batches {
        writer.write(batch).unwrap();
    }
    writer.close().unwrap();

    put_object(root, key, &buffer);
}

/// Store a Parquet inventory file with at most `row_group_size` rows per row group.
pub fn put_parquet_file(root: &Path, key: &str, objects: &[InventoryObject], row_group_size: usize) {
    let batch = inventory_batch(objects, TimeUnit::Millisecond);
    let schema = batch.schema();

    let mut buffer = Vec::new();
    let props = WriterProperties::builder()
        .set_max_row_group_size(row_group_size)
        .build();
    let mut writer = ArrowWriter::try_new(&mut buffer, schema, Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    put_object(root, key, &buffer);
}

/// Local store that counts calls and can be made to hang or fail on download.
pub struct CountingStore {
    inner: LocalObjectStore,
    pub downloads: AtomicUsize,
    pub calls: AtomicUsize,
    pub hang_downloads: AtomicBool,
    /// The first download waits a little, then fails.
    pub fail_first_download: AtomicBool,
}

impl CountingStore {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalObjectStore::new(root),
            downloads: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            hang_downloads: AtomicBool::new(false),
            fail_first_download: AtomicBool::new(false),
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn get(&self, bucket: &str, key: &str) -> anyhow::Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(bucket, key).await
    }

    async fn get_range(&self, bucket: &str, key: &str, range: Range<u64>) -> anyhow::Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_range(bucket, key, range).await
    }

    async fn size(&self, bucket: &str, key: &str) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.size(bucket, key).await
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        dest: &mut tokio::fs::File,
    ) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let attempt = self.downloads.fetch_add(1, Ordering::SeqCst);
        if attempt == 0 && self.fail_first_download.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            anyhow::bail!("connection reset while downloading {key}");
        }
        // Give concurrent requests for the same key a chance to pile up.
        tokio::task::yield_now().await;
        if self.hang_downloads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.download(bucket, key, dest).await
    }
}

/// Decodes files holding a JSON array of stripes, each an array of objects.
#[derive(Default)]
pub struct JsonStripeOpener {
    pub fail_cursor_close: bool,
    pub fail_file_close: bool,
    pub opened: AtomicUsize,
}

impl StripeFileOpener for JsonStripeOpener {
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn StripeFile>> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let stripes: Vec<Vec<InventoryObject>> =
            serde_json::from_slice(&data).context("Not a stripe file")?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(JsonStripeFile {
            stripes: Some(stripes),
            fail_cursor_close: self.fail_cursor_close,
            fail_file_close: self.fail_file_close,
        }))
    }
}

struct JsonStripeFile {
    stripes: Option<Vec<Vec<InventoryObject>>>,
    fail_cursor_close: bool,
    fail_file_close: bool,
}

impl StripeFile for JsonStripeFile {
    fn num_rows(&self) -> u64 {
        self.stripes
            .as_ref()
            .map_or(0, |s| s.iter().map(Vec::len).sum::<usize>() as u64)
    }

    fn select(&mut self, _columns: &[&str]) -> anyhow::Result<Box<dyn StripeCursor>> {
        let stripes = self.stripes.clone().context("file closed")?;
        Ok(Box::new(JsonStripeCursor {
            stripes: stripes.into_iter(),
            current: Vec::new(),
            position: 0,
            fail_close: self.fail_cursor_close,
        }))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.stripes = None;
        if self.fail_file_close {
            anyhow::bail!("file close failed");
        }
        Ok(())
    }
}

struct JsonStripeCursor {
    stripes: std::vec::IntoIter<Vec<InventoryObject>>,
    current: Vec<InventoryObject>,
    position: usize,
    fail_close: bool,
}

impl StripeCursor for JsonStripeCursor {
    fn next_row(&mut self) -> anyhow::Result<bool> {
        if self.position < self.current.len() {
            self.position += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn next_stripe(&mut self) -> anyhow::Result<bool> {
        self.position = 0;
        match self.stripes.next() {
            Some(stripe) => {
                self.current = stripe;
                Ok(true)
            }
            None => {
                self.current.clear();
                Ok(false)
            }
        }
    }

    fn row(&self) -> anyhow::Result<InventoryObject> {
        self.position
            .checked_sub(1)
            .and_then(|i| self.current.get(i))
            .cloned()
            .context("cursor not on a row")
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if self.fail_close {
            anyhow::bail!("cursor close failed");
        }
        Ok(())
    }
}

/// Number of entries in `dir`.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
