// rust/event-core/src/dataset/mod.rs

//! Datasets and the record layout of the files they are made of.
//!
//! A [`Dataset`] is a named, ordered list of event files. Each file is a
//! sequence of records in one [`RecordFormat`]; a [`RecordIndex`] locates
//! the records of one file so that events can be visited by position.

mod format;
mod index;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use format::{
    parse_format, FixedSizeFormat, LengthPrefixedFormat, NewlineDelimitedFormat, RecordFormat,
};
pub use index::RecordIndex;

/// A named, ordered collection of input files treated as one logical
/// stream of events.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub files: Vec<PathBuf>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, files: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            name: name.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("num_files", &self.files.len())
            .finish()
    }
}
