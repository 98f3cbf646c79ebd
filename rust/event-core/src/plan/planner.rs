// rust/event-core/src/plan/planner.rs

use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use twox_hash::XxHash64;

use crate::dataset::{Dataset, RecordFormat, RecordIndex};
use crate::error::{AnalysisError, Result};
use crate::storage::StorageBackend;

use super::limits::PlanLimits;
use super::unit::WorkUnitConfig;

/// Determines how many events a file holds.
pub trait EventCounter: Send + Sync {
    /// Opens `path` and counts its events.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn count_events(&self, path: &Path) -> Result<u64>;
}

/// Counts events by indexing the records of a file in storage.
pub struct StorageEventCounter {
    storage: Arc<dyn StorageBackend>,
    format: Arc<dyn RecordFormat>,
}

impl StorageEventCounter {
    pub fn new(storage: Arc<dyn StorageBackend>, format: Arc<dyn RecordFormat>) -> Self {
        Self { storage, format }
    }
}

impl EventCounter for StorageEventCounter {
    fn count_events(&self, path: &Path) -> Result<u64> {
        let mut reader = self.storage.open_read(path)?;
        let index = RecordIndex::build(&mut *reader, self.format.as_ref())?;
        Ok(index.len())
    }
}

/// Number of events taken from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvents {
    pub path: PathBuf,
    pub events: u64,
}

/// A contiguous slice of a dataset's event stream.
///
/// `start` is relative to the first entry of `paths`; the slice runs for
/// `length` events across `paths` in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRange {
    pub paths: Vec<PathBuf>,
    pub start: u64,
    pub length: u64,
}

/// Splits datasets into work units.
///
/// Planning happens on the coordinating thread before any work is
/// dispatched: every selected file is opened once to count its events,
/// then the event stream is cut into ranges that honour the limits.
pub struct PartitionPlanner {
    counter: Arc<dyn EventCounter>,
    limits: PlanLimits,
}

impl PartitionPlanner {
    pub fn new(counter: Arc<dyn EventCounter>, limits: PlanLimits) -> Self {
        Self { counter, limits }
    }

    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    /// The files of `dataset` that take part in planning.
    pub fn file_list_in<'a>(&self, dataset: &'a Dataset) -> &'a [PathBuf] {
        match self.limits.max_files_per_dataset {
            Some(max) => {
                let n = usize::try_from(max).unwrap_or(usize::MAX).min(dataset.files.len());
                &dataset.files[..n]
            }
            None => &dataset.files,
        }
    }

    /// Counts events file by file.
    ///
    /// Stops opening files once the running total meets the dataset cap;
    /// the counts returned are not yet truncated to it.
    pub fn file_event_counts(&self, dataset: &Dataset) -> Result<Vec<FileEvents>> {
        let mut counts = Vec::new();
        let mut total = 0u64;

        for path in self.file_list_in(dataset) {
            if matches!(self.limits.max_events_per_dataset, Some(cap) if total >= cap) {
                break;
            }

            let events = self.counter.count_events(path)?;
            tracing::debug!(
                dataset = %dataset.name,
                path = %path.display(),
                events,
                "counted events"
            );

            total += events;
            counts.push(FileEvents {
                path: path.clone(),
                events,
            });
        }

        Ok(counts)
    }

    /// Computes the ordered work units for `dataset`.
    ///
    /// # Errors
    ///
    /// Returns `AnalysisError::Plan` if any selected file cannot be opened
    /// or read.
    pub fn plan(&self, dataset: &Arc<Dataset>) -> Result<Vec<WorkUnitConfig>> {
        if self.limits.excludes_everything() || self.file_list_in(dataset).is_empty() {
            tracing::debug!(dataset = %dataset.name, "nothing to plan");
            return Ok(Vec::new());
        }

        let counts = self
            .file_event_counts(dataset)
            .map_err(|e| AnalysisError::plan(&dataset.name, e))?;

        let configs: Vec<_> = split_into_ranges(&counts, &self.limits)
            .into_iter()
            .map(|range| {
                WorkUnitConfig::from_parts(
                    range.paths,
                    range.start,
                    Some(range.length),
                    dataset.clone(),
                )
            })
            .collect();

        let events: u64 = configs.iter().filter_map(|c| c.max_events()).sum();
        tracing::info!(
            dataset = %dataset.name,
            files = counts.len(),
            units = configs.len(),
            events,
            fingerprint = %format!("{:016x}", fingerprint(&configs)),
            "planned work units"
        );

        Ok(configs)
    }
}

/// Cuts the event stream described by `files` into work unit ranges.
///
/// The dataset cap truncates the stream first; the file that crosses it is
/// kept with a reduced count. The stream is then cut into consecutive
/// ranges of at most `max_events_per_work_unit` events, and a range is
/// also closed once it has used up `max_files_per_work_unit` files. Files
/// without events never appear in a range.
pub fn split_into_ranges(files: &[FileEvents], limits: &PlanLimits) -> Vec<EventRange> {
    if limits.excludes_everything() {
        return Vec::new();
    }

    let capped = apply_dataset_cap(files, limits.max_events_per_dataset);
    let total: u64 = capped.iter().map(|f| f.events).sum();
    if total == 0 {
        return Vec::new();
    }

    let events_per_unit = limits.max_events_per_work_unit.unwrap_or(total);
    let files_per_unit = limits.max_files_per_work_unit.unwrap_or(u64::MAX);

    let mut ranges = Vec::new();
    let mut current: Option<EventRange> = None;

    for file in capped.iter().filter(|f| f.events > 0) {
        let mut position = 0u64;
        let mut in_current = false;

        while position < file.events {
            let range = current.get_or_insert_with(|| EventRange {
                paths: Vec::new(),
                start: position,
                length: 0,
            });
            if !in_current {
                range.paths.push(file.path.clone());
                in_current = true;
            }

            let take = (file.events - position).min(events_per_unit - range.length);
            range.length += take;
            position += take;

            let events_full = range.length == events_per_unit;
            let files_full = range.paths.len() as u64 >= files_per_unit && position == file.events;

            if events_full || files_full {
                if let Some(range) = current.take() {
                    ranges.push(range);
                }
                in_current = false;
            }
        }
    }

    if let Some(range) = current {
        ranges.push(range);
    }

    ranges
}

fn apply_dataset_cap(files: &[FileEvents], cap: Option<u64>) -> Vec<FileEvents> {
    let Some(cap) = cap else {
        return files.to_vec();
    };

    let mut remaining = cap;
    let mut capped = Vec::with_capacity(files.len());
    for file in files {
        if remaining == 0 {
            break;
        }
        let events = file.events.min(remaining);
        remaining -= events;
        capped.push(FileEvents {
            path: file.path.clone(),
            events,
        });
    }
    capped
}

/// Digest of an ordered plan.
///
/// Two runs over the same inputs with the same limits produce the same
/// fingerprint; any change in files, offsets, lengths or order changes it.
pub fn fingerprint(configs: &[WorkUnitConfig]) -> u64 {
    let mut hasher = XxHash64::default();

    for config in configs {
        hasher.write(config.name().as_bytes());
        hasher.write_u8(0);
        for path in config.input_paths() {
            hasher.write(path.to_string_lossy().as_bytes());
            hasher.write_u8(0);
        }
        hasher.write_u64(config.start());
        hasher.write_u64(config.max_events().unwrap_or(u64::MAX));
    }

    hasher.finish()
}
