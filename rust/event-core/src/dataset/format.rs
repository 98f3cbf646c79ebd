// rust/event-core/src/dataset/format.rs

use std::sync::Arc;

use crate::error::{AnalysisError, Result};

/// Describes how to find event record boundaries in a file.
pub trait RecordFormat: Send + Sync {
    /// Find the end of the record that starts at `offset` in `data`.
    /// Returns the byte position after the record ends (exclusive end),
    /// or None if no complete record is found.
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize>;

    /// Name of this record format
    fn name(&self) -> &'static str;

    /// Size of every record when it is constant.
    ///
    /// Files in such a format can be indexed from their size alone,
    /// without reading any data.
    fn fixed_record_size(&self) -> Option<usize> {
        None
    }

    /// Whether trailing bytes after the last complete record still form a
    /// record of their own.
    fn accepts_unterminated_tail(&self) -> bool {
        false
    }

    /// The event payload of a complete record, without framing bytes.
    fn payload<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        record
    }
}

/// Fixed-size records
#[derive(Debug, Clone)]
pub struct FixedSizeFormat {
    pub record_size: usize,
}

impl FixedSizeFormat {
    pub fn new(record_size: usize) -> Self {
        Self { record_size }
    }
}

impl RecordFormat for FixedSizeFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset >= data.len() {
            return None;
        }

        let bytes_into_record = offset % self.record_size;
        let end = offset + (self.record_size - bytes_into_record);
        if end <= data.len() {
            Some(end)
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "fixed-size"
    }

    fn fixed_record_size(&self) -> Option<usize> {
        Some(self.record_size)
    }
}

/// Newline-delimited records (JSONL, CSV, etc.)
#[derive(Debug, Clone, Default)]
pub struct NewlineDelimitedFormat;

impl NewlineDelimitedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for NewlineDelimitedFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset >= data.len() {
            return None;
        }

        data[offset..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map(|i| offset + i + 1) // Include the newline
    }

    fn name(&self) -> &'static str {
        "newline-delimited"
    }

    fn accepts_unterminated_tail(&self) -> bool {
        true
    }

    fn payload<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        record.strip_suffix(b"\r").unwrap_or(record)
    }
}

/// Length-prefixed records (4-byte big-endian length + data)
#[derive(Debug, Clone, Default)]
pub struct LengthPrefixedFormat;

impl LengthPrefixedFormat {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormat for LengthPrefixedFormat {
    fn find_record_end(&self, data: &[u8], offset: usize) -> Option<usize> {
        if offset + 4 > data.len() {
            return None;
        }

        let length_bytes: [u8; 4] = data[offset..offset + 4].try_into().ok()?;
        let length = u32::from_be_bytes(length_bytes) as usize;

        let end = offset + 4 + length;
        if end <= data.len() {
            Some(end)
        } else {
            None
        }
    }

    fn name(&self) -> &'static str {
        "length-prefixed"
    }

    fn payload<'a>(&self, record: &'a [u8]) -> &'a [u8] {
        record.get(4..).unwrap_or_default()
    }
}

/// Parses a format string into a RecordFormat implementation.
///
/// Supported formats:
/// - "fixed:N" - Fixed-size records of N bytes
/// - "newline" - Newline-delimited records (JSONL, CSV, etc.)
/// - "length-prefixed" - 4-byte big-endian length prefix + data
pub fn parse_format(format: &str) -> Result<Arc<dyn RecordFormat>> {
    if let Some(size_str) = format.strip_prefix("fixed:") {
        let size: usize = size_str.parse().map_err(|_| {
            AnalysisError::config(format!("invalid fixed record size: '{size_str}'"))
        })?;
        if size == 0 {
            return Err(AnalysisError::config("fixed record size must be > 0"));
        }
        Ok(Arc::new(FixedSizeFormat::new(size)))
    } else {
        match format {
            "newline" => Ok(Arc::new(NewlineDelimitedFormat::new())),
            "length-prefixed" => Ok(Arc::new(LengthPrefixedFormat::new())),
            _ => Err(AnalysisError::config(format!(
                "unknown record format: '{}'. Expected 'fixed:N', 'newline', or 'length-prefixed'",
                format
            ))),
        }
    }
}
