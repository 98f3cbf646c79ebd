// rust/event-core/src/storage/memory.rs

//! In-memory storage used by unit tests across the crate.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{StorageBackend, StorageReader, StorageWriter};
use crate::error::{AnalysisError, Result};

/// Mock storage backend keeping every object in a shared map.
///
/// Counts `open_read` calls so tests can assert that no I/O happened.
#[derive(Default)]
pub(crate) struct MemoryStorage {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    opens: AtomicUsize,
}

impl MemoryStorage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_file(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(path.into(), data.into());
    }

    /// Adds a newline-delimited file holding `n` JSON records.
    pub(crate) fn add_events(&self, path: impl Into<PathBuf>, n: usize) {
        let mut data = String::new();
        for i in 0..n {
            data.push_str(&format!("{{\"seq\": {i}}}\n"));
        }
        self.add_file(path, data);
    }

    pub(crate) fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

struct MockReader {
    data: Cursor<Vec<u8>>,
    size: u64,
}

impl Read for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.data.read(buf)
    }
}

impl Seek for MockReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.data.seek(pos)
    }
}

impl StorageReader for MockReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        self.data
            .seek(SeekFrom::Start(start))
            .map_err(|e| AnalysisError::storage_with_source("mock", "seek failed", e))?;

        let mut buf = vec![0u8; length];
        let bytes_read = self
            .data
            .read(&mut buf)
            .map_err(|e| AnalysisError::storage_with_source("mock", "read failed", e))?;
        buf.truncate(bytes_read);
        Ok(buf)
    }
}

struct MockWriter {
    path: PathBuf,
    data: Vec<u8>,
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageWriter for MockWriter {
    fn finish(self: Box<Self>) -> Result<()> {
        let MockWriter { path, data, files } = *self;
        files.lock().unwrap().insert(path, data);
        Ok(())
    }
}

impl StorageBackend for MemoryStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        let data = files
            .get(path)
            .ok_or_else(|| AnalysisError::storage(path, "not found"))?
            .clone();

        let size = data.len() as u64;
        Ok(Box::new(MockReader {
            data: Cursor::new(data),
            size,
        }))
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        Ok(Box::new(MockWriter {
            path: path.to_path_buf(),
            data: Vec::new(),
            files: self.files.clone(),
        }))
    }
}
