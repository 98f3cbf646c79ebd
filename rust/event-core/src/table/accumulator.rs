// rust/event-core/src/table/accumulator.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AnalysisError, Result};
use crate::pipeline::{EventContext, FieldValue};

use super::binning::KeyValue;
use super::spec::{SummaryKind, TableSpec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CountCell {
    n: u64,
    nvar: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum Rows {
    Count(BTreeMap<Vec<KeyValue>, CountCell>),
    Sum(BTreeMap<Vec<KeyValue>, Vec<f64>>),
    Scan(Vec<(Vec<KeyValue>, Vec<KeyValue>)>),
}

/// Rows of one table collected so far.
///
/// Each work unit fills its own accumulator; the results are merged in
/// plan order afterwards. The first key element is always the component.
#[derive(Debug, Clone)]
pub struct TableAccumulator {
    spec: Arc<TableSpec>,
    rows: Rows,
}

impl TableAccumulator {
    pub fn new(spec: Arc<TableSpec>) -> Self {
        let rows = match spec.summary {
            SummaryKind::Count => Rows::Count(BTreeMap::new()),
            SummaryKind::Sum => Rows::Sum(BTreeMap::new()),
            SummaryKind::Scan => Rows::Scan(Vec::new()),
        };
        Self { spec, rows }
    }

    pub fn spec(&self) -> &Arc<TableSpec> {
        &self.spec
    }

    /// Number of rows the table would have if written now.
    pub fn len(&self) -> usize {
        match &self.rows {
            Rows::Count(rows) => rows.len(),
            Rows::Sum(rows) => rows.len(),
            Rows::Scan(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds the rows contributed by the current event.
    ///
    /// List fields are walked element by element, all with the same
    /// length; scalar fields repeat on every element.
    ///
    /// # Errors
    ///
    /// Returns a table error if a field is missing or lists disagree in
    /// length.
    pub fn fill(&mut self, ctx: &EventContext) -> Result<()> {
        let keys = self.lookup(ctx, &self.spec.key_fields)?;
        let values = self.lookup(ctx, &self.spec.value_fields)?;

        let mut length: Option<(usize, &str)> = None;
        let named = self
            .spec
            .key_fields
            .iter()
            .zip(&keys)
            .chain(self.spec.value_fields.iter().zip(&values));
        for (name, value) in named {
            if let Some(len) = value.list_len() {
                match length {
                    None => length = Some((len, name.as_str())),
                    Some((expected, first)) if expected != len => {
                        return Err(AnalysisError::table(format!(
                            "'{first}' has {expected} elements but '{name}' has {len}"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        let rows = length.map_or(1, |(len, _)| len);

        for i in 0..rows {
            let mut key = Vec::with_capacity(keys.len() + 1);
            key.push(KeyValue::Text(ctx.dataset().to_string()));
            for (k, value) in keys.iter().enumerate() {
                key.push(self.spec.binning(k).bin(element(value, i))?);
            }

            match &mut self.rows {
                Rows::Count(rows) => {
                    let cell = rows.entry(key).or_default();
                    cell.n += 1;
                    cell.nvar += 1;
                }
                Rows::Sum(rows) => {
                    let sums = rows
                        .entry(key)
                        .or_insert_with(|| vec![0.0; values.len()]);
                    for (sum, value) in sums.iter_mut().zip(&values) {
                        *sum += element(value, i).as_f64().ok_or_else(|| {
                            AnalysisError::table("cannot sum a text value")
                        })?;
                    }
                }
                Rows::Scan(rows) => {
                    let row = values.iter().map(|v| element(v, i)).collect();
                    rows.push((key, row));
                }
            }
        }

        Ok(())
    }

    fn lookup<'c>(&self, ctx: &'c EventContext, fields: &[String]) -> Result<Vec<&'c FieldValue>> {
        fields
            .iter()
            .map(|name| {
                ctx.get(name).ok_or_else(|| {
                    AnalysisError::table(format!(
                        "field '{name}' needed by {} is not set",
                        self.spec.file_name()
                    ))
                })
            })
            .collect()
    }

    /// Folds the rows of `other` into this table.
    ///
    /// # Errors
    ///
    /// Returns a table error if the two accumulators describe different
    /// tables.
    pub fn merge(&mut self, other: TableAccumulator) -> Result<()> {
        if self.spec != other.spec {
            return Err(AnalysisError::table(format!(
                "cannot merge {} into {}",
                other.spec.file_name(),
                self.spec.file_name()
            )));
        }

        match (&mut self.rows, other.rows) {
            (Rows::Count(rows), Rows::Count(more)) => {
                for (key, cell) in more {
                    let total = rows.entry(key).or_default();
                    total.n += cell.n;
                    total.nvar += cell.nvar;
                }
            }
            (Rows::Sum(rows), Rows::Sum(more)) => {
                for (key, sums) in more {
                    match rows.get_mut(&key) {
                        Some(totals) => {
                            for (total, sum) in totals.iter_mut().zip(sums) {
                                *total += sum;
                            }
                        }
                        None => {
                            rows.insert(key, sums);
                        }
                    }
                }
            }
            (Rows::Scan(rows), Rows::Scan(more)) => rows.extend(more),
            _ => return Err(AnalysisError::table("summary kinds differ")),
        }

        Ok(())
    }

    /// Rows as display strings, in table order.
    pub fn formatted_rows(&self) -> Vec<Vec<String>> {
        fn show(values: &[KeyValue]) -> Vec<String> {
            values.iter().map(ToString::to_string).collect()
        }

        match &self.rows {
            Rows::Count(rows) => rows
                .iter()
                .map(|(key, cell)| {
                    let mut row = show(key);
                    row.push(cell.n.to_string());
                    row.push(cell.nvar.to_string());
                    row
                })
                .collect(),
            Rows::Sum(rows) => rows
                .iter()
                .map(|(key, sums)| {
                    let mut row = show(key);
                    row.extend(sums.iter().map(ToString::to_string));
                    row
                })
                .collect(),
            Rows::Scan(rows) => rows
                .iter()
                .map(|(key, values)| {
                    let mut row = show(key);
                    row.extend(show(values));
                    row
                })
                .collect(),
        }
    }
}

/// Element `i` of a list field, or the scalar itself.
fn element(value: &FieldValue, i: usize) -> KeyValue {
    match value {
        FieldValue::Int(v) => KeyValue::Int(*v),
        FieldValue::Float(v) => KeyValue::Float(*v),
        FieldValue::Text(v) => KeyValue::Text(v.clone()),
        FieldValue::IntList(v) => KeyValue::Int(v[i]),
        FieldValue::FloatList(v) => KeyValue::Float(v[i]),
    }
}
