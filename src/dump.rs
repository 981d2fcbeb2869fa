//! Commands that print manifest contents.

use anyhow::Context;
use s3_inventory_reader::{InventoryObject, InventoryReader, Manifest, ManifestFileReader};
use std::future::Future;
use std::io::Write;

/// Print the format, inventory bucket and data-file keys of a manifest.
pub fn list_files<W: Write>(manifest: &Manifest, out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "format: {}", manifest.format)?;
    writeln!(out, "inventory bucket: {}", manifest.inventory_bucket)?;
    for key in manifest.keys() {
        writeln!(out, "{key}")?;
    }
    Ok(())
}

/// Write every object of the given data files as JSON lines.
///
/// `keys` defaults to every file in the manifest. `skip` rows are skipped at
/// the start of each file, which only ORC readers support. Returns the number
/// of objects written.
pub async fn dump<W: Write>(
    reader: &InventoryReader,
    keys: &[String],
    skip: i64,
    batch_size: usize,
    out: &mut W,
) -> anyhow::Result<u64> {
    let keys: Vec<String> = if keys.is_empty() {
        reader.manifest().keys().map(str::to_string).collect()
    } else {
        keys.to_vec()
    };

    let mut batch = vec![InventoryObject::default(); batch_size.max(1)];
    let mut total = 0;
    for key in &keys {
        let mut file = reader
            .get_manifest_file_reader(key)
            .await
            .with_context(|| format!("Failed to open inventory file {key}"))?;

        let result = dump_file(&mut file, skip, &mut batch, out).await;
        let closed = file.close();
        let written = result.with_context(|| format!("Failed to read inventory file {key}"))?;
        closed.with_context(|| format!("Failed to close inventory file {key}"))?;

        tracing::info!("Read {} objects from {}", written, key);
        total += written;
    }

    out.flush()?;
    Ok(total)
}

/// Run [`dump`] until it finishes or `shutdown` completes, whichever is first.
///
/// Readers still open when `shutdown` wins are dropped, which removes their
/// local copies.
pub async fn dump_until<W, S>(
    reader: &InventoryReader,
    keys: &[String],
    skip: i64,
    batch_size: usize,
    out: &mut W,
    shutdown: S,
) -> anyhow::Result<u64>
where
    W: Write,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = dump(reader, keys, skip, batch_size, out) => result,
        _ = shutdown => anyhow::bail!("Interrupted"),
    }
}

async fn dump_file<W: Write>(
    file: &mut ManifestFileReader,
    skip: i64,
    batch: &mut [InventoryObject],
    out: &mut W,
) -> anyhow::Result<u64> {
    if skip > 0 {
        let format = file.format();
        file.as_materialized_mut()
            .with_context(|| format!("Skipping rows is not supported for {format} files"))?
            .skip_rows(skip)?;
    }

    let mut written = 0;
    loop {
        let filled = file.read(batch).await?;
        for object in &batch[..filled] {
            serde_json::to_writer(&mut *out, object)?;
            out.write_all(b"\n")?;
        }
        written += filled as u64;
        if filled < batch.len() {
            return Ok(written);
        }
        // ORC reads never suspend; let a pending shutdown run between batches.
        tokio::task::yield_now().await;
    }
}
