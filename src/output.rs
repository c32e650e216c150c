use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write records as CSV with a header row taken from the record struct's
/// field names in declaration order.
///
/// An empty slice writes nothing and returns `Ok(false)` so the caller can
/// report the skip; this is not an error.
pub fn write_csv<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<bool> {
    let path = path.as_ref();
    if records.is_empty() {
        return Ok(false);
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create CSV output: {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("failed to write CSV row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush CSV output: {}", path.display()))?;
    Ok(true)
}

/// Write records as a pretty-printed JSON array. An empty slice still
/// produces a valid `[]` document. Unset optional fields serialize as `null`.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create JSON output: {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), records)
        .with_context(|| format!("failed to write JSON output: {}", path.display()))?;
    Ok(())
}
