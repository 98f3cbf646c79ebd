// rust/event-core/src/storage/mod.rs

//! Storage abstraction for event inputs and table outputs.
//!
//! # Example
//!
//! ```no_run
//! use event_core::config::StorageConfig;
//! use event_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default());
//! let mut reader = storage.open_read(Path::new("events/run1.jsonl")).unwrap();
//! let head = reader.read_range(0, 16).unwrap();
//! ```

mod local;
mod traits;

#[cfg(test)]
pub(crate) mod memory;

pub use local::LocalStorage;
pub use traits::{StorageBackend, StorageReader, StorageWriter};
