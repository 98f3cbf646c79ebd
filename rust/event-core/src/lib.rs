// rust/event-core/src/lib.rs

//! Event Analysis Framework - Core Library
//!
//! This crate splits datasets of event files into bounded work units, runs
//! a pipeline of per-event stages over each unit on a local worker pool, and
//! aggregates the results into summary tables.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use storage::{LocalStorage, StorageBackend, StorageReader, StorageWriter};

pub mod dataset;
pub use dataset::{
    parse_format, Dataset, FixedSizeFormat, LengthPrefixedFormat, NewlineDelimitedFormat,
    RecordFormat,
};

pub mod plan;
pub use plan::{PartitionPlanner, PlanLimits, WorkUnitConfig};

pub mod events;
pub use events::{EventBuilder, EventSource, EventSourceFactory, StorageEventFactory};

pub mod pipeline;
pub use pipeline::{EventContext, Pipeline, Stage, StageSpec};

pub mod table;
pub use table::{TableSet, TableSpec};

pub mod runner;
pub use runner::ParallelRunner;

pub mod profile;
pub use profile::{ProfileReport, StageTiming, UnitProfile};

pub mod reader;
pub use reader::{Analysis, DatasetLoop, EventLoopReader, EventReader};

pub mod framework;
pub use framework::{DatasetPlan, Framework, RunReport};
