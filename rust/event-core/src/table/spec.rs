// rust/event-core/src/table/spec.rs

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::pipeline::{FieldKind, FieldSpec};

use super::binning::Binning;

/// Column holding the dataset name in every table.
pub const COMPONENT_COLUMN: &str = "component";

/// How the rows of a table are summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    /// Entries per key: columns `n` and `nvar`.
    #[default]
    Count,
    /// Sum of each value field per key.
    Sum,
    /// Every key/value combination, unaggregated.
    Scan,
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Scan => "scan",
        })
    }
}

/// Description of one output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Fields forming the key of a row.
    pub key_fields: Vec<String>,
    /// One binning per key field; empty means echo for all.
    #[serde(default)]
    pub binnings: Vec<Binning>,
    /// Column names for the key fields; empty means the field names.
    #[serde(default)]
    pub out_columns: Vec<String>,
    #[serde(default)]
    pub value_fields: Vec<String>,
    /// Column names for the value fields; empty means the field names.
    #[serde(default)]
    pub value_columns: Vec<String>,
    #[serde(default)]
    pub summary: SummaryKind,
    /// File name inside the output directory.
    #[serde(default)]
    pub out_file: Option<String>,
}

impl TableSpec {
    pub fn new(key_fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            key_fields: key_fields.into_iter().map(Into::into).collect(),
            binnings: Vec::new(),
            out_columns: Vec::new(),
            value_fields: Vec::new(),
            value_columns: Vec::new(),
            summary: SummaryKind::Count,
            out_file: None,
        }
    }

    pub fn with_binnings(mut self, binnings: Vec<Binning>) -> Self {
        self.binnings = binnings;
        self
    }

    pub fn with_out_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.out_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_values(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.value_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_summary(mut self, summary: SummaryKind) -> Self {
        self.summary = summary;
        self
    }

    pub fn with_out_file(mut self, out_file: impl Into<String>) -> Self {
        self.out_file = Some(out_file.into());
        self
    }

    /// Binning of key field `i`.
    pub fn binning(&self, i: usize) -> &Binning {
        const ECHO: Binning = Binning::Echo;
        self.binnings.get(i).unwrap_or(&ECHO)
    }

    pub fn key_columns(&self) -> &[String] {
        if self.out_columns.is_empty() {
            &self.key_fields
        } else {
            &self.out_columns
        }
    }

    pub fn value_column_names(&self) -> &[String] {
        if self.value_columns.is_empty() {
            &self.value_fields
        } else {
            &self.value_columns
        }
    }

    /// Header of the table, component column first.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![COMPONENT_COLUMN.to_string()];
        columns.extend(self.key_columns().iter().cloned());
        match self.summary {
            SummaryKind::Count => columns.extend(["n".to_string(), "nvar".to_string()]),
            SummaryKind::Sum | SummaryKind::Scan => {
                columns.extend(self.value_column_names().iter().cloned())
            }
        }
        columns
    }

    /// Output file name: `out_file`, or `tbl_<summary>.<key columns>.txt`.
    pub fn file_name(&self) -> String {
        if let Some(name) = &self.out_file {
            return name.clone();
        }

        let mut parts = vec![format!("tbl_{}", self.summary)];
        parts.extend(self.key_columns().iter().cloned());
        if self.summary != SummaryKind::Count {
            parts.extend(self.value_column_names().iter().cloned());
        }
        format!("{}.txt", parts.join("."))
    }

    /// Checks the table against the fields the pipeline provides.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    pub fn validate(&self, provided: &[FieldSpec]) -> Result<()> {
        let invalid = |message: String| {
            AnalysisError::config(format!("table '{}': {message}", self.file_name()))
        };

        if self.key_fields.is_empty() {
            return Err(invalid("no key fields".to_string()));
        }
        if !self.binnings.is_empty() && self.binnings.len() != self.key_fields.len() {
            return Err(invalid(format!(
                "{} binnings for {} key fields",
                self.binnings.len(),
                self.key_fields.len()
            )));
        }
        if !self.out_columns.is_empty() && self.out_columns.len() != self.key_fields.len() {
            return Err(invalid(format!(
                "{} out columns for {} key fields",
                self.out_columns.len(),
                self.key_fields.len()
            )));
        }
        if !self.value_columns.is_empty() && self.value_columns.len() != self.value_fields.len() {
            return Err(invalid(format!(
                "{} value columns for {} value fields",
                self.value_columns.len(),
                self.value_fields.len()
            )));
        }
        if self.summary == SummaryKind::Sum && self.value_fields.is_empty() {
            return Err(invalid("a sum table needs value fields".to_string()));
        }

        let kinds: HashMap<&str, FieldKind> =
            provided.iter().map(|f| (f.name.as_str(), f.kind)).collect();
        let kind_of = |name: &str| {
            kinds
                .get(name)
                .copied()
                .ok_or_else(|| invalid(format!("field '{name}' is not provided by any stage")))
        };

        for (i, field) in self.key_fields.iter().enumerate() {
            let binning = self.binning(i);
            binning.validate()?;
            if kind_of(field)? == FieldKind::Text && !binning.accepts_text() {
                return Err(invalid(format!("text field '{field}' can only be echoed")));
            }
        }

        for field in &self.value_fields {
            let kind = kind_of(field)?;
            if self.summary == SummaryKind::Sum && kind == FieldKind::Text {
                return Err(invalid(format!("cannot sum text field '{field}'")));
            }
        }

        Ok(())
    }
}
