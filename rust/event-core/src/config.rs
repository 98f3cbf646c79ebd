// rust/event-core/src/config.rs

//! Configuration of an analysis run.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dataset::{parse_format, Dataset};
use crate::error::{AnalysisError, Result};
use crate::pipeline::{Pipeline, StageSpec};
use crate::plan::PlanLimits;
use crate::table::TableSpec;

// Top-level analysis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub parallel: ParallelConfig,
    pub output: OutputConfig,
    #[serde(rename = "dataset", skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<Dataset>,
    #[serde(rename = "stage", skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageSpec>,
    #[serde(rename = "table", skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableSpec>,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Directory relative input and output paths are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O for large inputs.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
    /// Layout of the records in the input files: "newline",
    /// "length-prefixed" or "fixed:N".
    pub record_format: String,
}

/// Partitioning limits; any negative value means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_events_per_dataset: i64,
    pub max_events_per_work_unit: i64,
    pub max_files_per_dataset: i64,
    pub max_files_per_work_unit: i64,
}

// Worker pool options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    // Number of work units processed at the same time.
    pub processes: usize,
    // Suppress per-dataset progress output.
    pub quiet: bool,
}

// Table output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub out_dir: PathBuf,
    // Rewrite tables whose output file already exists.
    pub force: bool,
    // Record per-unit and per-stage timings.
    pub profile: bool,
    // Where the timing report is written; without it the report is only
    // returned to the caller.
    pub profile_out_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
            record_format: "newline".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_events_per_dataset: -1,
            max_events_per_work_unit: -1,
            max_files_per_dataset: -1,
            max_files_per_work_unit: 1,
        }
    }
}

impl LimitsConfig {
    pub fn plan_limits(&self) -> PlanLimits {
        PlanLimits::from_signed(
            self.max_events_per_dataset,
            self.max_events_per_work_unit,
            self.max_files_per_dataset,
            self.max_files_per_work_unit,
        )
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            processes: 1,
            quiet: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("tbl").join("out"),
            force: false,
            profile: false,
            profile_out_path: None,
        }
    }
}

impl FromStr for AnalysisConfig {
    type Err = AnalysisError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| AnalysisError::config_with_source("failed to parse TOML config", e))
    }
}

impl AnalysisConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `TWIRL_` and use underscores
    // to separate nested fields. For example:
    // - `TWIRL_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `TWIRL_LIMITS_MAX_EVENTS_PER_DATASET` overrides `limits.max_events_per_dataset`
    // - `TWIRL_PARALLEL_PROCESSES` overrides `parallel.processes`
    // - `TWIRL_OUTPUT_OUT_DIR` overrides `output.out_dir`
    // - `TWIRL_OUTPUT_PROFILE_OUT_PATH` overrides `output.profile_out_path`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Storage overrides
        if let Ok(val) = std::env::var("TWIRL_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TWIRL_STORAGE_BUFFER_SIZE") {
            if let Ok(v) = val.parse() {
                self.storage.buffer_size = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_STORAGE_RECORD_FORMAT") {
            self.storage.record_format = val;
        }

        // Limit overrides
        if let Ok(val) = std::env::var("TWIRL_LIMITS_MAX_EVENTS_PER_DATASET") {
            if let Ok(v) = val.parse() {
                self.limits.max_events_per_dataset = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_LIMITS_MAX_EVENTS_PER_WORK_UNIT") {
            if let Ok(v) = val.parse() {
                self.limits.max_events_per_work_unit = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_LIMITS_MAX_FILES_PER_DATASET") {
            if let Ok(v) = val.parse() {
                self.limits.max_files_per_dataset = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_LIMITS_MAX_FILES_PER_WORK_UNIT") {
            if let Ok(v) = val.parse() {
                self.limits.max_files_per_work_unit = v;
            }
        }

        // Parallel overrides
        if let Ok(val) = std::env::var("TWIRL_PARALLEL_PROCESSES") {
            if let Ok(v) = val.parse() {
                self.parallel.processes = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_PARALLEL_QUIET") {
            if let Ok(v) = val.parse() {
                self.parallel.quiet = v;
            }
        }

        // Output overrides
        if let Ok(val) = std::env::var("TWIRL_OUTPUT_OUT_DIR") {
            self.output.out_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TWIRL_OUTPUT_FORCE") {
            if let Ok(v) = val.parse() {
                self.output.force = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_OUTPUT_PROFILE") {
            if let Ok(v) = val.parse() {
                self.output.profile = v;
            }
        }
        if let Ok(val) = std::env::var("TWIRL_OUTPUT_PROFILE_OUT_PATH") {
            self.output.profile_out_path = Some(PathBuf::from(val));
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Storage validation
        if self.storage.buffer_size == 0 {
            return Err(AnalysisError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }
        parse_format(&self.storage.record_format)?;

        // Parallel validation
        if self.parallel.processes == 0 {
            return Err(AnalysisError::config(
                "parallel.processes must be greater than 0",
            ));
        }

        // Dataset validation
        let mut names = HashSet::new();
        for dataset in &self.datasets {
            if dataset.name.is_empty() {
                return Err(AnalysisError::config("dataset.name must not be empty"));
            }
            if !names.insert(dataset.name.as_str()) {
                return Err(AnalysisError::dataset(&dataset.name, "defined more than once"));
            }
        }

        // Stage and table validation
        let pipeline = Pipeline::from_specs(&self.stages)?;
        let provided = pipeline.provided_fields();
        for table in &self.tables {
            table.validate(&provided)?;
        }

        Ok(())
    }
}
