// rust/event-core/src/events/factory.rs

use std::fmt;
use std::sync::Arc;

use crate::dataset::RecordFormat;
use crate::error::Result;
use crate::plan::WorkUnitConfig;
use crate::storage::StorageBackend;

use super::source::EventSource;

/// Turns work unit descriptors into live event sources.
pub trait EventSourceFactory: Send + Sync {
    /// Opens the files of `config`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any file cannot be opened.
    fn open(&self, config: &WorkUnitConfig) -> Result<EventSource>;
}

/// Opens event sources from a storage backend in one record format.
pub struct StorageEventFactory {
    storage: Arc<dyn StorageBackend>,
    format: Arc<dyn RecordFormat>,
}

impl StorageEventFactory {
    pub fn new(storage: Arc<dyn StorageBackend>, format: Arc<dyn RecordFormat>) -> Self {
        Self { storage, format }
    }
}

impl EventSourceFactory for StorageEventFactory {
    fn open(&self, config: &WorkUnitConfig) -> Result<EventSource> {
        EventSource::open(config.clone(), self.storage.as_ref(), self.format.clone())
    }
}

/// A work unit ready to be dispatched.
///
/// Holds only the descriptor and the factory; no file is touched until
/// [`build`](Self::build) is called on the worker.
#[derive(Clone)]
pub struct EventBuilder {
    config: WorkUnitConfig,
    factory: Arc<dyn EventSourceFactory>,
}

impl EventBuilder {
    pub fn new(config: WorkUnitConfig, factory: Arc<dyn EventSourceFactory>) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &WorkUnitConfig {
        &self.config
    }

    /// Opens the event source of this unit.
    ///
    /// # Errors
    ///
    /// Returns a storage error if any file cannot be opened.
    pub fn build(&self) -> Result<EventSource> {
        self.factory.open(&self.config)
    }
}

impl fmt::Debug for EventBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
