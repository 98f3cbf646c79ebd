// rust/event-core/src/storage/traits.rs

//! Storage abstraction traits.
//!
//! Event files are read and table files are written through these traits,
//! so that planners and workers can be exercised against in-memory backends.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::Result;

/// A handle for reading from storage.
///
/// This trait extends `Read` and `Seek` with additional methods for
/// efficient random access.
pub trait StorageReader: Read + Seek + Send {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;

    /// Reads a range of bytes from the object.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the range is out of bounds.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;
}

/// A handle for writing to storage.
pub trait StorageWriter: Write + Send {
    /// Finishes the write operation, ensuring all data is persisted.
    ///
    /// After calling `finish`, the writer should not be used again.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The core storage backend trait.
///
/// Object-safe; shared between the planner and workers as
/// `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Opens an object for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be opened.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Opens an object for writing, creating parent directories as needed.
    /// An existing object is overwritten.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;
}
