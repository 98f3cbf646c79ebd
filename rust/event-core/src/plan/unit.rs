// rust/event-core/src/plan/unit.rs

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{AnalysisError, Result};

/// Descriptor of one partition of one dataset.
///
/// A `WorkUnitConfig` is a plain value: it can be serialized, sent to
/// another process and turned into a live event source there. It never
/// holds open files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnitConfig {
    input_paths: Vec<PathBuf>,
    /// Offset relative to the first path in `input_paths`.
    start: u64,
    /// `None` means every event from `start` onwards.
    max_events: Option<u64>,
    dataset: Arc<Dataset>,
    /// Copy of the dataset name, used for progress reporting.
    name: String,
}

impl WorkUnitConfig {
    /// Creates a work unit descriptor.
    ///
    /// A negative `max_events` means unbounded. The descriptor is not
    /// checked against the files' contents.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `start` is negative.
    pub fn new(
        input_paths: Vec<PathBuf>,
        start: i64,
        max_events: i64,
        dataset: Arc<Dataset>,
    ) -> Result<Self> {
        if start < 0 {
            return Err(AnalysisError::config(format!(
                "start must be greater than or equal to zero: {start} is given"
            )));
        }

        Ok(Self::from_parts(
            input_paths,
            start as u64,
            u64::try_from(max_events).ok(),
            dataset,
        ))
    }

    pub(crate) fn from_parts(
        input_paths: Vec<PathBuf>,
        start: u64,
        max_events: Option<u64>,
        dataset: Arc<Dataset>,
    ) -> Self {
        let name = dataset.name.clone();
        Self {
            input_paths,
            start,
            max_events,
            dataset,
            name,
        }
    }

    pub fn input_paths(&self) -> &[PathBuf] {
        &self.input_paths
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn max_events(&self) -> Option<u64> {
        self.max_events
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
