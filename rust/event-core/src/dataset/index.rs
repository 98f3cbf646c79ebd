// rust/event-core/src/dataset/index.rs

use std::ops::Range;

use crate::error::Result;
use crate::storage::StorageReader;

use super::format::RecordFormat;

/// Buffer size for scanning a file for record boundaries
const SCAN_BUFFER_SIZE: usize = 64 * 1024; // 64KB

/// Byte layout of the records in one event file.
///
/// Building an index is the expensive part of opening a file: variable-size
/// formats are scanned end to end once. Afterwards any record can be
/// located in constant time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordIndex {
    /// Records of constant size; trailing partial bytes are ignored.
    Fixed { record_size: u64, count: u64 },
    /// Record boundaries; record `i` spans `bounds[i]..bounds[i + 1]`.
    Scanned { bounds: Vec<u64> },
}

impl RecordIndex {
    /// Index every record in the file behind `reader`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from storage fails.
    pub fn build(reader: &mut dyn StorageReader, format: &dyn RecordFormat) -> Result<Self> {
        let file_size = reader.size();

        if let Some(record_size) = format.fixed_record_size() {
            let record_size = record_size as u64;
            if file_size % record_size != 0 {
                tracing::warn!(
                    file_size,
                    record_size,
                    "ignoring trailing bytes that do not form a complete record"
                );
            }
            return Ok(Self::Fixed {
                record_size,
                count: file_size / record_size,
            });
        }

        let mut bounds = vec![0u64];
        let mut offset = 0u64;
        let mut read_size = SCAN_BUFFER_SIZE;

        while offset < file_size {
            let remaining = file_size - offset;
            let length = (read_size as u64).min(remaining) as usize;
            let data = reader.read_range(offset, length)?;

            let mut consumed = 0;
            while let Some(record_end) = format.find_record_end(&data, consumed) {
                bounds.push(offset + record_end as u64);
                consumed = record_end;
            }

            if consumed == 0 {
                // A record longer than the buffer: grow the buffer and retry
                if (length as u64) < remaining {
                    read_size *= 2;
                    continue;
                }

                if format.accepts_unterminated_tail() {
                    bounds.push(file_size);
                } else {
                    tracing::warn!(
                        offset,
                        trailing_bytes = remaining,
                        format = format.name(),
                        "ignoring incomplete record at end of file"
                    );
                }
                break;
            }

            offset += consumed as u64;
            read_size = SCAN_BUFFER_SIZE;
        }

        Ok(Self::Scanned { bounds })
    }

    /// Number of records in the file.
    pub fn len(&self) -> u64 {
        match self {
            Self::Fixed { count, .. } => *count,
            Self::Scanned { bounds } => bounds.len() as u64 - 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte range of record `i`, or None past the last record.
    pub fn byte_range(&self, i: u64) -> Option<Range<u64>> {
        if i >= self.len() {
            return None;
        }

        match self {
            Self::Fixed { record_size, .. } => Some(i * record_size..(i + 1) * record_size),
            Self::Scanned { bounds } => {
                let i = i as usize;
                Some(bounds[i]..bounds[i + 1])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::format::{FixedSizeFormat, LengthPrefixedFormat, NewlineDelimitedFormat};
    use crate::error::AnalysisError;
    use std::io::{Cursor, Read, Seek, SeekFrom};

    /// Mock storage reader for testing
    struct MockReader {
        data: Cursor<Vec<u8>>,
        size: u64,
        reads: usize,
    }

    impl MockReader {
        fn new(data: Vec<u8>) -> Self {
            let size = data.len() as u64;
            Self {
                data: Cursor::new(data),
                size,
                reads: 0,
            }
        }
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
            self.reads += 1;
            self.data.seek(SeekFrom::Start(start)).map_err(|e| {
                AnalysisError::storage_with_source("mock", "seek failed", e)
            })?;

            let mut buf = vec![0u8; length];
            let bytes_read = self.data.read(&mut buf).map_err(|e| {
                AnalysisError::storage_with_source("mock", "read failed", e)
            })?;
            buf.truncate(bytes_read);
            Ok(buf)
        }
    }

    #[test]
    fn test_fixed_index_needs_no_reads() {
        let mut reader = MockReader::new(vec![0u8; 105]);
        let index = RecordIndex::build(&mut reader, &FixedSizeFormat::new(10)).unwrap();

        assert_eq!(index.len(), 10);
        assert_eq!(index.byte_range(3), Some(30..40));
        assert_eq!(index.byte_range(10), None);
        assert_eq!(reader.reads, 0);
    }

    #[test]
    fn test_newline_index() {
        let mut reader = MockReader::new(b"a\nbb\n\nccc\n".to_vec());
        let index = RecordIndex::build(&mut reader, &NewlineDelimitedFormat::new()).unwrap();

        assert_eq!(index.len(), 4);
        assert_eq!(index.byte_range(0), Some(0..2));
        assert_eq!(index.byte_range(1), Some(2..5));
        assert_eq!(index.byte_range(2), Some(5..6)); // empty line is a record
        assert_eq!(index.byte_range(3), Some(6..10));
    }

    #[test]
    fn test_newline_unterminated_tail_is_a_record() {
        let mut reader = MockReader::new(b"one\ntwo".to_vec());
        let index = RecordIndex::build(&mut reader, &NewlineDelimitedFormat::new()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.byte_range(1), Some(4..7));
    }

    #[test]
    fn test_length_prefixed_incomplete_tail_ignored() {
        let mut data = vec![];
        for record in ["alpha", "beta"] {
            data.extend_from_slice(&(record.len() as u32).to_be_bytes());
            data.extend_from_slice(record.as_bytes());
        }
        data.extend_from_slice(&50u32.to_be_bytes());
        data.extend_from_slice(b"cut");

        let mut reader = MockReader::new(data);
        let index = RecordIndex::build(&mut reader, &LengthPrefixedFormat::new()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.byte_range(1), Some(9..17));
    }

    #[test]
    fn test_record_longer_than_scan_buffer() {
        let mut data = vec![b'x'; SCAN_BUFFER_SIZE * 3];
        data.push(b'\n');
        data.extend_from_slice(b"short\n");

        let mut reader = MockReader::new(data);
        let index = RecordIndex::build(&mut reader, &NewlineDelimitedFormat::new()).unwrap();

        assert_eq!(index.len(), 2);
        let first = SCAN_BUFFER_SIZE as u64 * 3 + 1;
        assert_eq!(index.byte_range(0), Some(0..first));
        assert_eq!(index.byte_range(1), Some(first..first + 6));
    }

    #[test]
    fn test_empty_file() {
        let mut reader = MockReader::new(vec![]);
        let index = RecordIndex::build(&mut reader, &NewlineDelimitedFormat::new()).unwrap();

        assert!(index.is_empty());
        assert_eq!(index.byte_range(0), None);
    }
}
