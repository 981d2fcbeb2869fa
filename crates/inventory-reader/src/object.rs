//! The uniform inventory record and its extraction from Arrow record batches.

use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type, TimeUnit, TimestampSecondType};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

pub const BUCKET_COLUMN: &str = "bucket";
pub const KEY_COLUMN: &str = "key";
pub const SIZE_COLUMN: &str = "size";
pub const LAST_MODIFIED_COLUMN: &str = "last_modified_date";

/// Columns read from every inventory data file, in projection order.
pub const INVENTORY_COLUMNS: [&str; 4] =
    [BUCKET_COLUMN, KEY_COLUMN, SIZE_COLUMN, LAST_MODIFIED_COLUMN];

/// One object listed in an inventory data file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryObject {
    pub bucket: String,
    pub key: String,
    pub size: Option<i64>,
    /// Last modification time in whole Unix seconds.
    pub last_modified: Option<i64>,
}

impl InventoryObject {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        size: Option<i64>,
        last_modified: Option<i64>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            size,
            last_modified,
        }
    }
}

/// The inventory columns of a record batch, normalized to fixed Arrow types.
///
/// Strings become `Utf8`, sizes `Int64` and timestamps `Timestamp(Second)`, so
/// row extraction does not depend on how the writer typed the columns.
/// `size` and `last_modified_date` are optional in the inventory schema.
pub struct InventoryColumns {
    bucket: ArrayRef,
    key: ArrayRef,
    size: Option<ArrayRef>,
    last_modified: Option<ArrayRef>,
}

impl InventoryColumns {
    pub fn from_batch(batch: &RecordBatch) -> Result<Self> {
        let bucket = required_column(batch, BUCKET_COLUMN, &DataType::Utf8)?;
        let key = required_column(batch, KEY_COLUMN, &DataType::Utf8)?;
        let size = optional_column(batch, SIZE_COLUMN, &DataType::Int64)?;
        let last_modified = optional_column(
            batch,
            LAST_MODIFIED_COLUMN,
            &DataType::Timestamp(TimeUnit::Second, None),
        )?;

        Ok(Self {
            bucket,
            key,
            size,
            last_modified,
        })
    }

    pub fn len(&self) -> usize {
        self.bucket.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the object at `row`. Null strings become empty.
    pub fn object(&self, row: usize) -> InventoryObject {
        let string_at = |array: &ArrayRef| {
            let strings = array.as_string::<i32>();
            if strings.is_valid(row) {
                strings.value(row).to_string()
            } else {
                String::new()
            }
        };

        let size = self.size.as_ref().and_then(|array| {
            let sizes = array.as_primitive::<Int64Type>();
            sizes.is_valid(row).then(|| sizes.value(row))
        });
        let last_modified = self.last_modified.as_ref().and_then(|array| {
            let times = array.as_primitive::<TimestampSecondType>();
            times.is_valid(row).then(|| times.value(row))
        });

        InventoryObject {
            bucket: string_at(&self.bucket),
            key: string_at(&self.key),
            size,
            last_modified,
        }
    }

    /// Build every object in the batch, in row order.
    pub fn objects(&self) -> impl Iterator<Item = InventoryObject> + '_ {
        (0..self.len()).map(|row| self.object(row))
    }
}

fn required_column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef> {
    optional_column(batch, name, to)?
        .with_context(|| format!("Inventory file has no '{name}' column"))
}

fn optional_column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<Option<ArrayRef>> {
    let Some(column) = batch.column_by_name(name) else {
        return Ok(None);
    };
    if column.data_type() == to {
        return Ok(Some(column.clone()));
    }
    let converted = cast(column, to).with_context(|| {
        format!(
            "Cannot convert column '{name}' from {} to {to}",
            column.data_type()
        )
    })?;
    Ok(Some(converted))
}
