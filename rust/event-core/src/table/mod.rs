// rust/event-core/src/table/mod.rs

//! Summary tables keyed by binned event fields.

mod accumulator;
mod binning;
mod spec;
mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AnalysisError, Result};
use crate::pipeline::EventContext;
use crate::storage::StorageBackend;

pub use accumulator::TableAccumulator;
pub use binning::{Binning, KeyValue};
pub use spec::{SummaryKind, TableSpec, COMPONENT_COLUMN};
pub use writer::{format_table, write_table};

/// The tables filled by one work unit, or the merge of several.
#[derive(Debug, Clone)]
pub struct TableSet {
    tables: Vec<TableAccumulator>,
}

impl TableSet {
    pub fn new(specs: &[Arc<TableSpec>]) -> Self {
        Self {
            tables: specs.iter().cloned().map(TableAccumulator::new).collect(),
        }
    }

    pub fn tables(&self) -> &[TableAccumulator] {
        &self.tables
    }

    pub fn fill(&mut self, ctx: &EventContext) -> Result<()> {
        for table in &mut self.tables {
            table.fill(ctx)?;
        }
        Ok(())
    }

    /// Folds `other` into this set, table by table.
    pub fn merge(&mut self, other: TableSet) -> Result<()> {
        if self.tables.len() != other.tables.len() {
            return Err(AnalysisError::table(format!(
                "cannot merge {} tables into {}",
                other.tables.len(),
                self.tables.len()
            )));
        }

        for (table, more) in self.tables.iter_mut().zip(other.tables) {
            table.merge(more)?;
        }
        Ok(())
    }

    /// Writes every table into `out_dir`, returning the written paths.
    pub fn write(&self, storage: &dyn StorageBackend, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            let path = out_dir.join(table.spec().file_name());
            write_table(storage, &path, table)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Drops tables whose output file already exists, unless `force` is set.
pub fn pending_tables(
    specs: &[Arc<TableSpec>],
    storage: &dyn StorageBackend,
    out_dir: &Path,
    force: bool,
) -> Result<Vec<Arc<TableSpec>>> {
    if force {
        return Ok(specs.to_vec());
    }

    let mut pending = Vec::with_capacity(specs.len());
    for spec in specs {
        let path = out_dir.join(spec.file_name());
        if storage.exists(&path)? {
            tracing::info!(path = %path.display(), "table exists, skipping");
        } else {
            pending.push(spec.clone());
        }
    }
    Ok(pending)
}
