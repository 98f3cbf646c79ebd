// rust/event-core/src/pipeline/context.rs

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Type of a per-event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Int,
    Float,
    Text,
    IntList,
    FloatList,
}

impl FieldKind {
    pub fn is_list(self) -> bool {
        matches!(self, Self::IntList | Self::FloatList)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::IntList => "int_list",
            Self::FloatList => "float_list",
        };
        f.write_str(name)
    }
}

/// A named, typed field a stage reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Value of a per-event field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Int(_) => FieldKind::Int,
            Self::Float(_) => FieldKind::Float,
            Self::Text(_) => FieldKind::Text,
            Self::IntList(_) => FieldKind::IntList,
            Self::FloatList(_) => FieldKind::FloatList,
        }
    }

    /// Number of elements for lists, `None` for scalars.
    pub fn list_len(&self) -> Option<usize> {
        match self {
            Self::IntList(v) => Some(v.len()),
            Self::FloatList(v) => Some(v.len()),
            _ => None,
        }
    }
}

/// Fields derived so far for the event being processed.
///
/// One context is reused for every event of a work unit; it is cleared
/// before each event.
#[derive(Debug, Clone)]
pub struct EventContext {
    dataset: String,
    index: u64,
    entry: u64,
    fields: HashMap<String, FieldValue>,
}

impl EventContext {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            index: 0,
            entry: 0,
            fields: HashMap::new(),
        }
    }

    /// Prepares the context for the next event.
    pub fn reset(&mut self, index: u64, entry: u64) {
        self.index = index;
        self.entry = entry;
        self.fields.clear();
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn entry(&self) -> u64 {
        self.entry
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Looks up a field that `stage` depends on.
    pub fn require(&self, stage: &str, name: &str) -> Result<&FieldValue> {
        self.get(name)
            .ok_or_else(|| AnalysisError::stage(stage, format!("field '{name}' is not set")))
    }

    /// Looks up a float list field that `stage` depends on.
    pub fn float_list(&self, stage: &str, name: &str) -> Result<&[f64]> {
        match self.require(stage, name)? {
            FieldValue::FloatList(values) => Ok(values),
            other => Err(AnalysisError::stage(
                stage,
                format!("field '{name}' is {}, expected float_list", other.kind()),
            )),
        }
    }
}
