// rust/event-core/src/plan/limits.rs

use serde::{Deserialize, Serialize};

/// Converts a signed limit where any negative value means "unbounded".
pub fn limit_from_signed(value: i64) -> Option<u64> {
    u64::try_from(value).ok()
}

/// Bounds applied when partitioning a dataset into work units.
///
/// `None` leaves the corresponding dimension unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Total events taken from a dataset.
    pub max_events_per_dataset: Option<u64>,
    /// Events handled by a single work unit.
    pub max_events_per_work_unit: Option<u64>,
    /// Only the first N files of a dataset are considered.
    pub max_files_per_dataset: Option<u64>,
    /// Files a single work unit may touch.
    pub max_files_per_work_unit: Option<u64>,
}

impl PlanLimits {
    /// No limits at all: one work unit per dataset.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Builds limits from signed values, with `-1` meaning unbounded.
    pub fn from_signed(
        max_events_per_dataset: i64,
        max_events_per_work_unit: i64,
        max_files_per_dataset: i64,
        max_files_per_work_unit: i64,
    ) -> Self {
        Self {
            max_events_per_dataset: limit_from_signed(max_events_per_dataset),
            max_events_per_work_unit: limit_from_signed(max_events_per_work_unit),
            max_files_per_dataset: limit_from_signed(max_files_per_dataset),
            max_files_per_work_unit: limit_from_signed(max_files_per_work_unit),
        }
    }

    pub fn with_max_events_per_dataset(mut self, n: u64) -> Self {
        self.max_events_per_dataset = Some(n);
        self
    }

    pub fn with_max_events_per_work_unit(mut self, n: u64) -> Self {
        self.max_events_per_work_unit = Some(n);
        self
    }

    pub fn with_max_files_per_dataset(mut self, n: u64) -> Self {
        self.max_files_per_dataset = Some(n);
        self
    }

    pub fn with_max_files_per_work_unit(mut self, n: u64) -> Self {
        self.max_files_per_work_unit = Some(n);
        self
    }

    /// True when some limit is zero, which leaves nothing to process.
    pub(crate) fn excludes_everything(&self) -> bool {
        [
            self.max_events_per_dataset,
            self.max_events_per_work_unit,
            self.max_files_per_dataset,
            self.max_files_per_work_unit,
        ]
        .contains(&Some(0))
    }
}
