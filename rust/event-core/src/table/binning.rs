// rust/event-core/src/table/binning.rs

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// One cell of a table key.
#[derive(Debug, Clone)]
pub enum KeyValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl KeyValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Float(_) => 1,
            Self::Text(_) => 2,
        }
    }

    /// Numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Maps a raw key value to the value shown in the table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Binning {
    /// The value itself.
    #[default]
    Echo,
    /// Lower edge of the bin of size `width` containing the value, with
    /// bin edges at `anchor + k * width`.
    Round {
        width: f64,
        #[serde(default)]
        anchor: f64,
    },
}

impl Binning {
    pub fn round(width: f64, anchor: f64) -> Self {
        Self::Round { width, anchor }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Round { width, anchor } if !(width.is_finite() && *width > 0.0) || !anchor.is_finite() => {
                Err(AnalysisError::config(format!(
                    "round binning needs a positive width and a finite anchor, got width {width} anchor {anchor}"
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn accepts_text(&self) -> bool {
        matches!(self, Self::Echo)
    }

    /// Bins `value`.
    ///
    /// # Errors
    ///
    /// Returns a table error when rounding a text value.
    pub fn bin(&self, value: KeyValue) -> Result<KeyValue> {
        match self {
            Self::Echo => Ok(value),
            Self::Round { width, anchor } => {
                let v = value.as_f64().ok_or_else(|| {
                    AnalysisError::table(format!("cannot round text value '{value}'"))
                })?;
                Ok(KeyValue::Float(anchor + ((v - anchor) / width).floor() * width))
            }
        }
    }
}
