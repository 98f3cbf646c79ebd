// rust/event-core/src/framework.rs

//! Top-level orchestration of an analysis run.
//!
//! The `Framework` owns the storage backend and record format and wires the
//! planner, worker pool and dataset loop together for each run.
//!
//! # Example
//!
//! ```no_run
//! use event_core::{AnalysisConfig, Framework};
//!
//! let config = AnalysisConfig::from_file("twirl.toml").unwrap().with_env_overrides();
//! let framework = Framework::new(config).unwrap();
//!
//! let analysis = framework.analysis();
//! let report = framework.run(framework.datasets(), &analysis).unwrap();
//! println!("{} events in {} work units", report.events, report.units);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::dataset::{parse_format, Dataset, RecordFormat};
use crate::error::Result;
use crate::events::StorageEventFactory;
use crate::plan::{fingerprint, PartitionPlanner, StorageEventCounter, WorkUnitConfig};
use crate::profile::ProfileReport;
use crate::reader::{Analysis, DatasetLoop, DatasetSummary, EventLoopReader};
use crate::runner::ParallelRunner;
use crate::storage::{LocalStorage, StorageBackend};
use crate::table::pending_tables;

/// The work units planned for one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetPlan {
    pub dataset: String,
    pub fingerprint: u64,
    pub units: Vec<WorkUnitConfig>,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub datasets: Vec<DatasetSummary>,
    pub units: usize,
    pub events: u64,
    pub tables_written: Vec<PathBuf>,
    pub elapsed: Duration,
    /// Unit and stage timings, present when `output.profile` is set.
    pub profile: Option<ProfileReport>,
}

pub struct Framework {
    config: AnalysisConfig,
    storage: Arc<dyn StorageBackend>,
    format: Arc<dyn RecordFormat>,
}

impl Framework {
    /// Creates a framework reading and writing the local filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage));
        Self::with_storage(config, storage)
    }

    /// Creates a framework from a TOML configuration file, with environment
    /// overrides applied after loading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = AnalysisConfig::from_file(path)?.with_env_overrides();
        Self::new(config)
    }

    /// Creates a framework on top of an existing storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_storage(config: AnalysisConfig, storage: Arc<dyn StorageBackend>) -> Result<Self> {
        config.validate()?;
        let format = parse_format(&config.storage.record_format)?;

        Ok(Self {
            config,
            storage,
            format,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Datasets listed in the configuration.
    pub fn datasets(&self) -> Vec<Arc<Dataset>> {
        self.config.datasets.iter().cloned().map(Arc::new).collect()
    }

    /// Stages and tables listed in the configuration.
    pub fn analysis(&self) -> Analysis {
        Analysis::new(self.config.stages.clone(), self.config.tables.clone())
    }

    fn planner(&self) -> PartitionPlanner {
        let counter = StorageEventCounter::new(self.storage.clone(), self.format.clone());
        PartitionPlanner::new(Arc::new(counter), self.config.limits.plan_limits())
    }

    /// Plans every dataset without processing any event.
    ///
    /// # Errors
    ///
    /// Returns the first planning error.
    pub fn plan(&self, datasets: &[Arc<Dataset>]) -> Result<Vec<DatasetPlan>> {
        let planner = self.planner();
        datasets
            .iter()
            .map(|dataset| {
                let units = planner.plan(dataset)?;
                Ok(DatasetPlan {
                    dataset: dataset.name.clone(),
                    fingerprint: fingerprint(&units),
                    units,
                })
            })
            .collect()
    }

    /// Runs `analysis` over `datasets` and writes its tables into the
    /// output directory.
    ///
    /// Tables whose file already exists are skipped unless
    /// `output.force` is set. When every table is skipped no event is read.
    ///
    /// With `output.profile` the report carries unit and stage timings,
    /// also written to `output.profile_out_path` when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the analysis is inconsistent, if planning or any
    /// work unit fails, or if a table cannot be written.
    pub fn run(&self, datasets: Vec<Arc<Dataset>>, analysis: &Analysis) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!(
            datasets = datasets.len(),
            processes = self.config.parallel.processes,
            "analysis begin"
        );

        analysis.validate()?;

        let out_dir = &self.config.output.out_dir;
        let tables = pending_tables(
            &analysis.tables,
            self.storage.as_ref(),
            out_dir,
            self.config.output.force,
        )?;
        if tables.is_empty() && !analysis.tables.is_empty() {
            tracing::info!(out_dir = %out_dir.display(), "all tables exist, nothing to do");
            return Ok(RunReport {
                datasets: Vec::new(),
                units: 0,
                events: 0,
                tables_written: Vec::new(),
                elapsed: started.elapsed(),
                profile: None,
            });
        }

        let analysis = Arc::new(Analysis {
            stages: analysis.stages.clone(),
            tables,
        });
        let factory = Arc::new(StorageEventFactory::new(self.storage.clone(), self.format.clone()));
        let runner = ParallelRunner::new(self.config.parallel.processes)?;
        let reader = EventLoopReader::new(self.planner(), factory, runner, analysis)
            .quiet(self.config.parallel.quiet)
            .profiling(self.config.output.profile);

        let output = DatasetLoop::new(datasets, reader).run()?;
        let tables_written = output.tables.write(self.storage.as_ref(), out_dir)?;
        let profile_out_path = self.config.output.profile_out_path.as_ref();
        if let (Some(profile), Some(path)) = (&output.profile, profile_out_path) {
            profile.write(self.storage.as_ref(), path)?;
        }

        let report = RunReport {
            units: output.datasets.iter().map(|d| d.units).sum(),
            events: output.datasets.iter().map(|d| d.events).sum(),
            datasets: output.datasets,
            tables_written,
            elapsed: started.elapsed(),
            profile: output.profile,
        };
        tracing::info!(
            units = report.units,
            events = report.events,
            tables = report.tables_written.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "analysis end"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framework")
            .field("config", &self.config)
            .finish()
    }
}
