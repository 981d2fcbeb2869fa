//! ORC decoding backed by `orc-rust`.
//!
//! `orc-rust` yields Arrow record batches that never span a stripe, so each
//! decoded batch is surfaced to the cursor as one stripe.

use super::orc::{StripeCursor, StripeFile, StripeFileOpener};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::object::{InventoryColumns, InventoryObject};
use anyhow::{Context, Result};
use orc_rust::arrow_reader::{ArrowReader, ArrowReaderBuilder};
use orc_rust::projection::ProjectionMask;
use std::fs::File;
use std::path::Path;

/// Opens local ORC files.
#[derive(Debug, Clone)]
pub struct OrcFileOpener {
    batch_size: usize,
}

impl OrcFileOpener {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for OrcFileOpener {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl StripeFileOpener for OrcFileOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn StripeFile>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open ORC file: {}", path.display()))?;
        let builder = ArrowReaderBuilder::try_new(file)
            .with_context(|| format!("Failed to read ORC metadata: {}", path.display()))?;
        let num_rows = builder.file_metadata().number_of_rows();

        Ok(Box::new(OrcFile {
            builder: Some(builder),
            num_rows,
            batch_size: self.batch_size,
        }))
    }
}

struct OrcFile {
    builder: Option<ArrowReaderBuilder<File>>,
    num_rows: u64,
    batch_size: usize,
}

impl StripeFile for OrcFile {
    fn num_rows(&self) -> u64 {
        self.num_rows
    }

    fn select(&mut self, columns: &[&str]) -> Result<Box<dyn StripeCursor>> {
        let builder = self
            .builder
            .take()
            .context("ORC file is closed or already has a cursor")?;
        let projection =
            ProjectionMask::named_roots(builder.file_metadata().root_data_type(), columns);
        let reader = builder
            .with_projection(projection)
            .with_batch_size(self.batch_size)
            .build();

        Ok(Box::new(OrcCursor {
            reader: Some(reader),
            stripe: None,
            position: 0,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.builder = None;
        Ok(())
    }
}

struct OrcCursor {
    reader: Option<ArrowReader<File>>,
    stripe: Option<InventoryColumns>,
    /// Rows of the current stripe consumed so far; the current row is
    /// `position - 1`.
    position: usize,
}

impl StripeCursor for OrcCursor {
    fn next_row(&mut self) -> Result<bool> {
        match &self.stripe {
            Some(stripe) if self.position < stripe.len() => {
                self.position += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn next_stripe(&mut self) -> Result<bool> {
        self.stripe = None;
        self.position = 0;

        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        match reader.next() {
            Some(batch) => {
                let batch = batch.context("Failed to decode ORC stripe")?;
                self.stripe = Some(InventoryColumns::from_batch(&batch)?);
                Ok(true)
            }
            None => {
                self.reader = None;
                Ok(false)
            }
        }
    }

    fn row(&self) -> Result<InventoryObject> {
        match &self.stripe {
            Some(stripe) if self.position > 0 => Ok(stripe.object(self.position - 1)),
            _ => anyhow::bail!("ORC cursor is not positioned on a row"),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.stripe = None;
        Ok(())
    }
}
