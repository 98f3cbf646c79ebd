// rust/event-core/src/storage/local.rs

//! Local filesystem storage backend.
//!
//! Event files are read either through a buffered reader or, above a size
//! threshold, through a memory map. Table files are written through a
//! buffered writer that syncs on `finish`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{StorageBackend, StorageReader, StorageWriter};
use crate::config::StorageConfig;
use crate::error::{AnalysisError, Result};

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Base path that relative paths are resolved against.
    base_path: PathBuf,
    /// Buffer size for buffered I/O operations.
    buffer_size: usize,
    /// Whether to use memory-mapped I/O.
    use_mmap: bool,
    /// File size threshold above which to use mmap.
    mmap_threshold: u64,
}

impl LocalStorage {
    /// Creates a new `LocalStorage` instance from configuration.
    ///
    /// Unlike a writable store, the base path is not created here: input
    /// files must already exist and output directories are created lazily
    /// by `open_write`.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_path: config.base_path.clone(),
            buffer_size: config.buffer_size,
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        }
    }

    /// Resolves a path relative to the base path.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve_path(path).exists())
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path)
            .map_err(|e| AnalysisError::storage_with_source(&full_path, "failed to open file", e))?;

        let size = file
            .metadata()
            .map_err(|e| {
                AnalysisError::storage_with_source(&full_path, "failed to read file metadata", e)
            })?
            .len();

        if self.use_mmap && size >= self.mmap_threshold {
            // SAFETY: The file is opened read-only and the map is owned by
            // the reader for its whole lifetime.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                AnalysisError::storage_with_source(&full_path, "failed to memory-map file", e)
            })?;

            Ok(Box::new(MmapReader::new(mmap, full_path)))
        } else {
            Ok(Box::new(LocalReader::new(
                file,
                size,
                self.buffer_size,
                full_path,
            )))
        }
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full_path = self.resolve_path(path);

        if let Some(parent) = full_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    AnalysisError::storage_with_source(
                        parent,
                        "failed to create parent directories",
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .map_err(|e| {
                AnalysisError::storage_with_source(&full_path, "failed to create file", e)
            })?;

        Ok(Box::new(LocalWriter::new(file, self.buffer_size, full_path)))
    }
}

/// Buffered file reader for local storage.
struct LocalReader {
    reader: BufReader<File>,
    size: u64,
    path: PathBuf,
}

impl LocalReader {
    fn new(file: File, size: u64, buffer_size: usize, path: PathBuf) -> Self {
        Self {
            reader: BufReader::with_capacity(buffer_size, file),
            size,
            path,
        }
    }
}

impl Read for LocalReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for LocalReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl StorageReader for LocalReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(start)).map_err(|e| {
            AnalysisError::storage_with_source(
                &self.path,
                format!("failed to seek to position {start}"),
                e,
            )
        })?;

        let mut buf = vec![0u8; length];
        self.read_exact(&mut buf).map_err(|e| {
            AnalysisError::storage_with_source(
                &self.path,
                format!("failed to read {length} bytes at position {start}"),
                e,
            )
        })?;

        Ok(buf)
    }
}

/// Memory-mapped file reader for local storage.
struct MmapReader {
    mmap: Mmap,
    position: u64,
    path: PathBuf,
}

impl MmapReader {
    fn new(mmap: Mmap, path: PathBuf) -> Self {
        Self {
            mmap,
            position: 0,
            path,
        }
    }
}

impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let pos = (self.position as usize).min(self.mmap.len());
        let remaining = &self.mmap[pos..];
        let to_read = buf.len().min(remaining.len());

        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read as u64;
        Ok(to_read)
    }
}

impl Seek for MmapReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.mmap.len() as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek to negative position",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

impl StorageReader for MmapReader {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let start = start as usize;
        let end = start + length;

        if end > self.mmap.len() {
            return Err(AnalysisError::storage(
                &self.path,
                format!(
                    "read range {}..{} exceeds file size {}",
                    start,
                    end,
                    self.mmap.len()
                ),
            ));
        }

        Ok(self.mmap[start..end].to_vec())
    }
}

/// Buffered file writer for local storage.
struct LocalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl LocalWriter {
    fn new(file: File, buffer_size: usize, path: PathBuf) -> Self {
        Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            path,
        }
    }
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageWriter for LocalWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| AnalysisError::storage_with_source(&self.path, "failed to flush writer", e))?;

        self.writer.get_ref().sync_all().map_err(|e| {
            AnalysisError::storage_with_source(&self.path, "failed to sync file to disk", e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (LocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            buffer_size: 4096,
            use_mmap: true,
            mmap_threshold: 1024, // Low threshold for testing
            ..Default::default()
        };
        (LocalStorage::new(&config), temp_dir)
    }

    fn write_file(storage: &LocalStorage, path: &str, data: &[u8]) {
        let mut writer = storage.open_write(Path::new(path)).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_exists_file() {
        let (storage, _temp) = create_test_storage();

        assert!(!storage.exists(Path::new("events.jsonl")).unwrap());
        write_file(&storage, "events.jsonl", b"{}\n");
        assert!(storage.exists(Path::new("events.jsonl")).unwrap());
    }

    #[test]
    fn test_open_read_not_found() {
        let (storage, _temp) = create_test_storage();

        let result = storage.open_read(Path::new("missing.jsonl"));
        let err = result.err().expect("missing file should not open");
        assert!(err.to_string().contains("missing.jsonl"));
    }

    #[test]
    fn test_read_range_small_file() {
        let (storage, _temp) = create_test_storage();
        write_file(&storage, "small.bin", b"0123456789");

        let mut reader = storage.open_read(Path::new("small.bin")).unwrap();
        assert_eq!(reader.size(), 10);
        assert_eq!(reader.read_range(3, 4).unwrap(), b"3456");
    }

    #[test]
    fn test_read_range_large_file_uses_mmap() {
        let (storage, _temp) = create_test_storage();
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        write_file(&storage, "large.bin", &data);

        let mut reader = storage.open_read(Path::new("large.bin")).unwrap();
        assert_eq!(reader.size(), 4096);
        assert_eq!(reader.read_range(2000, 8).unwrap(), &data[2000..2008]);
    }

    #[test]
    fn test_read_range_out_of_bounds() {
        let (storage, _temp) = create_test_storage();
        write_file(&storage, "small.bin", b"0123456789");

        let mut reader = storage.open_read(Path::new("small.bin")).unwrap();
        assert!(reader.read_range(8, 10).is_err());
    }

    #[test]
    fn test_mmap_reader_seek_and_read() {
        let (storage, _temp) = create_test_storage();
        let data = vec![7u8; 2048];
        write_file(&storage, "large.bin", &data);

        let mut reader = storage.open_read(Path::new("large.bin")).unwrap();
        reader.seek(SeekFrom::End(-4)).unwrap();
        let mut tail = Vec::new();
        reader.read_to_end(&mut tail).unwrap();
        assert_eq!(tail, vec![7u8; 4]);

        assert!(reader.seek(SeekFrom::Current(-10_000)).is_err());
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let (storage, temp) = create_test_storage();
        write_file(&storage, "tbl/out/tbl_n.met.txt", b"met n\n");

        assert!(temp.path().join("tbl/out/tbl_n.met.txt").exists());
    }

    #[test]
    fn test_absolute_paths_bypass_base() {
        let (storage, _temp) = create_test_storage();
        let other = TempDir::new().unwrap();
        let absolute = other.path().join("abs.txt");
        std::fs::write(&absolute, b"abc").unwrap();

        let mut reader = storage.open_read(&absolute).unwrap();
        assert_eq!(reader.read_range(0, 3).unwrap(), b"abc");
    }

    #[test]
    fn test_object_safety() {
        let (storage, _temp) = create_test_storage();
        let backend: Box<dyn StorageBackend> = Box::new(storage);
        assert!(!backend.exists(Path::new("nothing")).unwrap());
    }
}
