// rust/event-core/src/events/source.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dataset::{RecordFormat, RecordIndex};
use crate::error::{AnalysisError, Result};
use crate::plan::WorkUnitConfig;
use crate::storage::{StorageBackend, StorageReader};

struct OpenFile {
    path: PathBuf,
    reader: Box<dyn StorageReader>,
    index: RecordIndex,
}

/// Live, file-backed event sequence for one work unit.
///
/// The files of the unit are chained into one stream; the source exposes
/// the slice `start .. start + n_events` of that stream. Obtained from an
/// [`EventBuilder`](super::EventBuilder) inside the worker that processes
/// the unit, never shared between threads.
pub struct EventSource {
    files: Vec<OpenFile>,
    format: Arc<dyn RecordFormat>,
    start: u64,
    n_events: u64,
    current_index: Option<u64>,
    config: WorkUnitConfig,
}

impl EventSource {
    /// Opens every file of `config` and resolves the event range.
    ///
    /// A start beyond the available events is clamped, leaving zero events
    /// to visit.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any file cannot be opened or indexed.
    pub fn open(
        config: WorkUnitConfig,
        storage: &dyn StorageBackend,
        format: Arc<dyn RecordFormat>,
    ) -> Result<Self> {
        let mut files = Vec::with_capacity(config.input_paths().len());
        for path in config.input_paths() {
            let mut reader = storage.open_read(path)?;
            let index = RecordIndex::build(&mut *reader, format.as_ref())?;
            files.push(OpenFile {
                path: path.clone(),
                reader,
                index,
            });
        }

        let available: u64 = files.iter().map(|f| f.index.len()).sum();
        let start = config.start().min(available);
        let remaining = available - start;
        let n_events = config
            .max_events()
            .map_or(remaining, |max| max.min(remaining));

        tracing::trace!(
            dataset = config.name(),
            files = files.len(),
            available,
            start,
            n_events,
            "opened event source"
        );

        Ok(Self {
            files,
            format,
            start,
            n_events,
            current_index: None,
            config,
        })
    }

    /// Events a full pass visits.
    pub fn n_events(&self) -> u64 {
        self.n_events
    }

    /// Offset of the first visited event, after clamping.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Position of the current event within the pass, `None` outside one.
    pub fn current_index(&self) -> Option<u64> {
        self.current_index
    }

    pub fn config(&self) -> &WorkUnitConfig {
        &self.config
    }

    pub fn dataset_name(&self) -> &str {
        self.config.name()
    }

    /// Starts a pass over the events of this source.
    pub fn events(&mut self) -> EventPass<'_> {
        EventPass {
            source: self,
            next: 0,
            file: 0,
            file_base: 0,
        }
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("dataset", &self.dataset_name())
            .field("num_files", &self.files.len())
            .field("start", &self.start)
            .field("n_events", &self.n_events)
            .field("current_index", &self.current_index)
            .finish()
    }
}

/// One event as seen during a pass.
#[derive(Debug)]
pub struct EventRecord<'a> {
    /// Position within the pass, starting at zero.
    pub index: u64,
    /// Position within the chained files of the unit.
    pub entry: u64,
    pub file: &'a Path,
    pub data: Vec<u8>,
}

/// A single pass over an [`EventSource`].
///
/// Dropping the pass, whether exhausted or not, resets the source's
/// current index.
pub struct EventPass<'a> {
    source: &'a mut EventSource,
    next: u64,
    file: usize,
    file_base: u64,
}

impl EventPass<'_> {
    /// Advances to the next event.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be read.
    pub fn next(&mut self) -> Result<Option<EventRecord<'_>>> {
        if self.next >= self.source.n_events {
            self.source.current_index = None;
            return Ok(None);
        }

        let index = self.next;
        let entry = self.source.start + index;

        while let Some(file) = self.source.files.get(self.file) {
            if entry < self.file_base + file.index.len() {
                break;
            }
            self.file_base += file.index.len();
            self.file += 1;
        }

        self.next += 1;
        self.source.current_index = Some(index);

        if self.file >= self.source.files.len() {
            return Err(AnalysisError::dataset(
                self.source.config.name(),
                format!("entry {entry} lies past the end of the unit's files"),
            ));
        }

        let local = entry - self.file_base;
        let file = &mut self.source.files[self.file];
        let range = file
            .index
            .byte_range(local)
            .ok_or_else(|| AnalysisError::storage(&file.path, format!("no record {local}")))?;
        let raw = file
            .reader
            .read_range(range.start, (range.end - range.start) as usize)?;

        Ok(Some(EventRecord {
            index,
            entry,
            file: &file.path,
            data: self.source.format.payload(&raw).to_vec(),
        }))
    }
}

impl Drop for EventPass<'_> {
    fn drop(&mut self) {
        self.source.current_index = None;
    }
}
