//! Reader for ORC inventory files, which are decoded from a local copy.
//!
//! The decoder is reached through the [`StripeFileOpener`], [`StripeFile`]
//! and [`StripeCursor`] traits. The cursor walks one stripe at a time and one
//! row at a time within it; [`OrcManifestFileReader`] turns that into batch
//! reads and row skipping that cross stripe boundaries.

use crate::cache::{MaterializationCache, MaterializedFile};
use crate::error::{InventoryError, Result};
use crate::object::InventoryObject;
use std::path::Path;
use std::sync::Arc;

/// Opens a local stripe-oriented file.
pub trait StripeFileOpener: Send + Sync {
    fn open(&self, path: &Path) -> anyhow::Result<Box<dyn StripeFile>>;
}

/// An opened local file.
pub trait StripeFile: Send {
    /// Row count declared by the file metadata.
    fn num_rows(&self) -> u64;

    /// Create a cursor over the named top-level columns.
    fn select(&mut self, columns: &[&str]) -> anyhow::Result<Box<dyn StripeCursor>>;

    fn close(&mut self) -> anyhow::Result<()>;
}

/// Row cursor positioned inside a stripe.
///
/// A fresh cursor is positioned before the first stripe, so `next_row`
/// returns `false` until `next_stripe` has loaded one.
pub trait StripeCursor: Send {
    /// Move to the next row of the current stripe. `false` once it is drained.
    fn next_row(&mut self) -> anyhow::Result<bool>;

    /// Load the next stripe. `false` when no stripes remain.
    fn next_stripe(&mut self) -> anyhow::Result<bool>;

    /// The row the cursor is on.
    fn row(&self) -> anyhow::Result<InventoryObject>;

    fn close(&mut self) -> anyhow::Result<()>;
}

/// Batch reader over a materialized ORC file.
///
/// Closing (or dropping) the reader deletes the local copy and removes it
/// from the materialization cache.
pub struct OrcManifestFileReader {
    key: String,
    file: Box<dyn StripeFile>,
    cursor: Box<dyn StripeCursor>,
    cache: Arc<MaterializationCache>,
    entry: Arc<MaterializedFile>,
    closed: bool,
}

impl OrcManifestFileReader {
    pub(crate) fn new(
        key: &str,
        file: Box<dyn StripeFile>,
        cursor: Box<dyn StripeCursor>,
        cache: Arc<MaterializationCache>,
        entry: Arc<MaterializedFile>,
    ) -> Self {
        Self {
            key: key.to_string(),
            file,
            cursor,
            cache,
            entry,
            closed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the local copy being read.
    pub fn local_path(&self) -> Option<&Path> {
        self.entry.local_path()
    }

    /// Total rows in the file, from its metadata, regardless of position.
    pub fn num_rows(&self) -> i64 {
        i64::try_from(self.file.num_rows()).unwrap_or(i64::MAX)
    }

    /// Fill `batch` from the current position.
    ///
    /// Returns the number of objects written. Anything less than
    /// `batch.len()` means the file is exhausted; further calls return `0`.
    pub fn read(&mut self, batch: &mut [InventoryObject]) -> Result<usize> {
        let mut filled = 0;
        while filled < batch.len() && self.advance()? {
            batch[filled] = self.cursor.row().map_err(|e| self.decode_error(e))?;
            filled += 1;
        }
        Ok(filled)
    }

    /// Move past exactly `n` rows without decoding them.
    ///
    /// `n <= 0` does nothing. Unlike `read`, running out of rows is an error,
    /// after which the position is undefined and the reader should only be
    /// closed.
    pub fn skip_rows(&mut self, n: i64) -> Result<()> {
        let mut skipped = 0;
        while skipped < n {
            if !self.advance()? {
                return Err(InventoryError::InsufficientRows {
                    key: self.key.clone(),
                    requested: n,
                    skipped,
                });
            }
            skipped += 1;
        }
        Ok(())
    }

    /// Release the decoder and delete the local copy.
    ///
    /// Every step runs even if an earlier one fails; the last failure is
    /// returned.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    /// Move the cursor to the next row, loading stripes as needed.
    fn advance(&mut self) -> Result<bool> {
        if self.cursor.next_row().map_err(|e| self.decode_error(e))? {
            return Ok(true);
        }
        loop {
            if !self.cursor.next_stripe().map_err(|e| self.decode_error(e))? {
                return Ok(false);
            }
            tracing::debug!("Started new stripe in file {}", self.key);
            if self.cursor.next_row().map_err(|e| self.decode_error(e))? {
                return Ok(true);
            }
        }
    }

    fn decode_error(&self, source: anyhow::Error) -> InventoryError {
        InventoryError::Decode {
            key: self.key.clone(),
            source,
        }
    }

    fn release(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut last_error = None;
        if let Err(e) = self.cursor.close() {
            tracing::warn!("Failed to close cursor for {}: {e:#}", self.key);
            last_error = Some(e);
        }
        if let Err(e) = self.file.close() {
            tracing::warn!("Failed to close ORC file {}: {e:#}", self.key);
            last_error = Some(e);
        }
        if let Err(e) = self.cache.release(&self.entry) {
            tracing::warn!("Failed to remove local copy of {}: {e}", self.key);
            last_error = Some(e.into());
        }

        match last_error {
            Some(source) => Err(InventoryError::Cleanup {
                key: self.key.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

impl Drop for OrcManifestFileReader {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!("ORC reader for {} dropped without close", self.key);
            // Errors were already logged by release.
            let _ = self.release();
        }
    }
}
