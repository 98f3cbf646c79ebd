// rust/event-core/src/table/writer.rs

use std::io::Write;
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::storage::StorageBackend;

use super::accumulator::TableAccumulator;

/// Lays out a header and rows as right-aligned, space-separated columns.
pub fn format_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    for line in std::iter::once(columns).chain(rows.iter().map(Vec::as_slice)) {
        let cells: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:>width$}"))
            .collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    out
}

/// Writes `table` to `path` through `storage`.
///
/// # Errors
///
/// Returns a storage error if the file cannot be written.
pub fn write_table(storage: &dyn StorageBackend, path: &Path, table: &TableAccumulator) -> Result<()> {
    let text = format_table(&table.spec().columns(), &table.formatted_rows());

    let mut writer = storage.open_write(path)?;
    writer
        .write_all(text.as_bytes())
        .map_err(|e| AnalysisError::storage_with_source(path, "failed to write table", e))?;
    writer.finish()?;

    tracing::debug!(path = %path.display(), rows = table.len(), "wrote table");
    Ok(())
}
