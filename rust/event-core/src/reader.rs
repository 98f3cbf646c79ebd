// rust/event-core/src/reader.rs

//! Driving a reader over a list of datasets.

use std::sync::Arc;
use std::time::Instant;

use crate::dataset::Dataset;
use crate::error::{AnalysisError, Result};
use crate::events::{EventBuilder, EventSourceFactory};
use crate::pipeline::{Pipeline, StageSpec};
use crate::plan::{fingerprint, PartitionPlanner};
use crate::profile::{duration_nanos, ProfileReport, UnitProfile};
use crate::runner::ParallelRunner;
use crate::table::{TableSet, TableSpec};

/// Consumer of datasets, called by a [`DatasetLoop`].
pub trait EventReader {
    type Output;

    fn begin(&mut self) -> Result<()>;

    fn read(&mut self, dataset: &Arc<Dataset>) -> Result<()>;

    fn end(&mut self) -> Result<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    NotStarted,
    Begun,
    Ended,
}

/// Runs a reader over datasets in order: `begin`, one `read` per dataset,
/// then `end`.
///
/// A loop runs once. An error from the reader aborts the loop without
/// calling `end`.
pub struct DatasetLoop<R> {
    datasets: Vec<Arc<Dataset>>,
    reader: R,
    state: LoopState,
}

impl<R: EventReader> DatasetLoop<R> {
    pub fn new(datasets: Vec<Arc<Dataset>>, reader: R) -> Self {
        Self {
            datasets,
            reader,
            state: LoopState::NotStarted,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// # Errors
    ///
    /// Returns a configuration error when called a second time, and
    /// otherwise the first error raised by the reader.
    pub fn run(&mut self) -> Result<R::Output> {
        if self.state != LoopState::NotStarted {
            return Err(AnalysisError::config("dataset loop has already run"));
        }

        self.state = LoopState::Begun;
        self.reader.begin()?;
        for dataset in &self.datasets {
            self.reader.read(dataset)?;
        }
        let output = self.reader.end()?;
        self.state = LoopState::Ended;

        Ok(output)
    }

    pub fn has_ended(&self) -> bool {
        self.state == LoopState::Ended
    }
}

/// Stages and tables applied to every event.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub stages: Vec<StageSpec>,
    pub tables: Vec<Arc<TableSpec>>,
}

impl Analysis {
    pub fn new(stages: Vec<StageSpec>, tables: impl IntoIterator<Item = TableSpec>) -> Self {
        Self {
            stages,
            tables: tables.into_iter().map(Arc::new).collect(),
        }
    }

    /// Checks that every table only reads fields the stages provide.
    pub fn validate(&self) -> Result<()> {
        let provided = Pipeline::from_specs(&self.stages)?.provided_fields();
        for table in &self.tables {
            table.validate(&provided)?;
        }
        Ok(())
    }
}

/// What was done for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSummary {
    pub name: String,
    pub units: usize,
    pub events: u64,
    /// Digest of the work unit plan.
    pub fingerprint: u64,
}

/// Result of an [`EventLoopReader`].
#[derive(Debug, Clone)]
pub struct ReaderOutput {
    pub tables: TableSet,
    pub datasets: Vec<DatasetSummary>,
    /// Unit and stage timings, when profiling.
    pub profile: Option<ProfileReport>,
}

struct UnitOutput {
    events: u64,
    tables: TableSet,
    profile: Option<UnitProfile>,
}

/// Plans each dataset, runs its work units on the worker pool and merges
/// their tables in plan order.
pub struct EventLoopReader {
    planner: PartitionPlanner,
    factory: Arc<dyn EventSourceFactory>,
    runner: ParallelRunner,
    analysis: Arc<Analysis>,
    quiet: bool,
    profiling: bool,
    tables: Option<TableSet>,
    summaries: Vec<DatasetSummary>,
    profile: Option<ProfileReport>,
}

impl EventLoopReader {
    pub fn new(
        planner: PartitionPlanner,
        factory: Arc<dyn EventSourceFactory>,
        runner: ParallelRunner,
        analysis: Arc<Analysis>,
    ) -> Self {
        Self {
            planner,
            factory,
            runner,
            analysis,
            quiet: false,
            profiling: false,
            tables: None,
            summaries: Vec::new(),
            profile: None,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Collects unit and stage timings into the output.
    pub fn profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    fn process_unit(
        unit: usize,
        builder: &EventBuilder,
        analysis: &Analysis,
        profiling: bool,
    ) -> Result<UnitOutput> {
        let started = Instant::now();
        let mut source = builder.build()?;
        let mut pipeline = Pipeline::from_specs(&analysis.stages)?;
        if profiling {
            pipeline = pipeline.with_profiling();
        }
        let mut tables = TableSet::new(&analysis.tables);

        let events = pipeline.run(&mut source, &mut |ctx| tables.fill(ctx))?;
        let elapsed = started.elapsed();

        tracing::debug!(
            unit,
            dataset = source.dataset_name(),
            start = source.start(),
            events,
            elapsed_ms = elapsed.as_millis() as u64,
            "work unit done"
        );

        let profile = profiling.then(|| UnitProfile {
            dataset: source.dataset_name().to_string(),
            unit,
            events,
            nanos: duration_nanos(elapsed),
            stages: pipeline.stage_timings().to_vec(),
        });
        Ok(UnitOutput {
            events,
            tables,
            profile,
        })
    }
}

impl EventReader for EventLoopReader {
    type Output = ReaderOutput;

    fn begin(&mut self) -> Result<()> {
        self.tables = Some(TableSet::new(&self.analysis.tables));
        self.summaries.clear();
        self.profile = self.profiling.then(ProfileReport::new);
        Ok(())
    }

    fn read(&mut self, dataset: &Arc<Dataset>) -> Result<()> {
        let tables = self
            .tables
            .as_mut()
            .ok_or_else(|| AnalysisError::config("read called before begin"))?;

        let configs = self.planner.plan(dataset)?;
        let plan_fingerprint = fingerprint(&configs);
        let builders: Vec<_> = configs
            .into_iter()
            .map(|config| EventBuilder::new(config, self.factory.clone()))
            .collect();
        let units = builders.len();

        let analysis = self.analysis.clone();
        let profiling = self.profiling;
        let outputs = self.runner.run(builders, move |unit, builder| {
            Self::process_unit(unit, &builder, &analysis, profiling)
        })?;

        let mut events = 0;
        for output in outputs {
            events += output.events;
            tables.merge(output.tables)?;
            if let (Some(report), Some(unit)) = (self.profile.as_mut(), output.profile) {
                report.push(unit);
            }
        }

        if self.quiet {
            tracing::debug!(dataset = %dataset.name, units, events, "dataset done");
        } else {
            tracing::info!(dataset = %dataset.name, units, events, "dataset done");
        }

        self.summaries.push(DatasetSummary {
            name: dataset.name.clone(),
            units,
            events,
            fingerprint: plan_fingerprint,
        });
        Ok(())
    }

    fn end(&mut self) -> Result<ReaderOutput> {
        let tables = self
            .tables
            .take()
            .ok_or_else(|| AnalysisError::config("end called before begin"))?;

        Ok(ReaderOutput {
            tables,
            datasets: std::mem::take(&mut self.summaries),
            profile: self.profile.take(),
        })
    }
}
