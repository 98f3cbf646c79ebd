// rust/event-core/src/pipeline/mod.rs

//! Ordered per-event stages.
//!
//! Stages communicate through an [`EventContext`] of named, typed fields.
//! A [`Pipeline`] checks at construction that every field a stage reads is
//! written by an earlier stage with the same kind.

mod context;
mod stage;

use std::collections::HashMap;
use std::time::Instant;

use crate::error::{AnalysisError, Result};
use crate::events::EventSource;
use crate::profile::StageTiming;

pub use context::{EventContext, FieldKind, FieldSpec, FieldValue};
pub use stage::{Stage, StageSpec};

/// Stages of one work unit, in execution order.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    timings: Option<Vec<StageTiming>>,
}

impl Pipeline {
    /// Validates the field dependencies between `stages`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a stage reads a field no earlier
    /// stage provides, reads it with a different kind, or if two stages
    /// provide the same field.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        let mut provided: HashMap<String, (FieldKind, String)> = HashMap::new();

        for stage in &stages {
            for required in stage.requires() {
                match provided.get(&required.name) {
                    None => {
                        return Err(AnalysisError::config(format!(
                            "stage '{}' requires field '{}' which no earlier stage provides",
                            stage.name(),
                            required.name
                        )))
                    }
                    Some((kind, by)) if *kind != required.kind => {
                        return Err(AnalysisError::config(format!(
                            "stage '{}' requires field '{}' as {}, but '{by}' provides {kind}",
                            stage.name(),
                            required.name,
                            required.kind
                        )))
                    }
                    Some(_) => {}
                }
            }

            for field in stage.provides() {
                if let Some((_, by)) = provided.get(&field.name) {
                    return Err(AnalysisError::config(format!(
                        "field '{}' is provided by both '{by}' and '{}'",
                        field.name,
                        stage.name()
                    )));
                }
                provided.insert(field.name, (field.kind, stage.name().to_string()));
            }
        }

        Ok(Self {
            stages,
            timings: None,
        })
    }

    /// Builds and validates the stages described by `specs`.
    pub fn from_specs(specs: &[StageSpec]) -> Result<Self> {
        let stages = specs.iter().map(StageSpec::build).collect::<Result<Vec<_>>>()?;
        Self::new(stages)
    }

    /// Every field the pipeline writes, in stage order.
    pub fn provided_fields(&self) -> Vec<FieldSpec> {
        self.stages.iter().flat_map(|s| s.provides()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Records per-stage timings during [`run`](Self::run).
    pub fn with_profiling(mut self) -> Self {
        self.timings = Some(
            self.stages
                .iter()
                .map(|s| StageTiming::new(s.name()))
                .collect(),
        );
        self
    }

    /// Time spent in each stage so far; empty unless profiling.
    pub fn stage_timings(&self) -> &[StageTiming] {
        self.timings.as_deref().unwrap_or_default()
    }

    /// Runs one pass over `source`, handing each processed event to `sink`.
    ///
    /// Returns the number of events processed. Every stage whose setup
    /// succeeded is torn down, even when a later setup or the pass fails;
    /// the first error is returned.
    pub fn run(
        &mut self,
        source: &mut EventSource,
        sink: &mut dyn FnMut(&EventContext) -> Result<()>,
    ) -> Result<u64> {
        let mut ready = 0;
        let mut outcome = Ok(0);
        for stage in &mut self.stages {
            if let Err(e) = stage.setup(source) {
                outcome = Err(e);
                break;
            }
            ready += 1;
        }

        if outcome.is_ok() {
            outcome = self.pass(source, sink);
        }

        let mut teardown = Ok(());
        for stage in &mut self.stages[..ready] {
            if let Err(e) = stage.teardown() {
                tracing::warn!(stage = stage.name(), error = %e, "stage teardown failed");
                if teardown.is_ok() {
                    teardown = Err(e);
                }
            }
        }

        let processed = outcome?;
        teardown?;
        Ok(processed)
    }

    fn pass(
        &mut self,
        source: &mut EventSource,
        sink: &mut dyn FnMut(&EventContext) -> Result<()>,
    ) -> Result<u64> {
        let mut ctx = EventContext::new(source.dataset_name());
        let mut events = source.events();
        let mut processed = 0u64;

        while let Some(record) = events.next()? {
            ctx.reset(record.index, record.entry);
            for (k, stage) in self.stages.iter_mut().enumerate() {
                let started = self.timings.is_some().then(Instant::now);
                stage.process(&record, &mut ctx)?;
                if let (Some(started), Some(timings)) = (started, self.timings.as_mut()) {
                    timings[k].record(started.elapsed());
                }
            }
            sink(&ctx)?;
            processed += 1;
        }

        Ok(processed)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, NewlineDelimitedFormat};
    use crate::events::EventRecord;
    use crate::plan::WorkUnitConfig;
    use crate::storage::memory::MemoryStorage;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn decode(fields: &[(&str, FieldKind)]) -> StageSpec {
        StageSpec::Decode {
            fields: fields
                .iter()
                .map(|(name, kind)| FieldSpec::new(*name, *kind))
                .collect(),
        }
    }

    #[test]
    fn test_valid_ordering() {
        let pipeline = Pipeline::from_specs(&[
            decode(&[("energy", FieldKind::FloatList)]),
            StageSpec::Threshold {
                input: "energy".into(),
                output: "energy_th".into(),
                min: 5.0,
            },
            StageSpec::Count {
                input: "energy_th".into(),
                output: "n".into(),
                list_kind: FieldKind::FloatList,
            },
        ])
        .unwrap();

        assert_eq!(pipeline.len(), 3);
        let names: Vec<_> = pipeline.provided_fields().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["energy", "energy_th", "n"]);
    }

    #[test]
    fn test_requirement_before_provider_rejected() {
        let err = Pipeline::from_specs(&[
            StageSpec::Threshold {
                input: "energy".into(),
                output: "energy_th".into(),
                min: 5.0,
            },
            decode(&[("energy", FieldKind::FloatList)]),
        ])
        .unwrap_err();

        assert!(matches!(err, AnalysisError::Config { .. }));
        assert!(err.to_string().contains("no earlier stage provides"));
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let err = Pipeline::from_specs(&[
            decode(&[("energy", FieldKind::IntList)]),
            StageSpec::Threshold {
                input: "energy".into(),
                output: "energy_th".into(),
                min: 5.0,
            },
        ])
        .unwrap_err();
        assert!(err.to_string().contains("as float_list"));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let err = Pipeline::from_specs(&[
            decode(&[("n", FieldKind::Int)]),
            decode(&[("n", FieldKind::Int)]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("provided by both"));
    }

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        fail_at: Option<u64>,
    }

    impl Stage for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn requires(&self) -> Vec<FieldSpec> {
            Vec::new()
        }

        fn provides(&self) -> Vec<FieldSpec> {
            Vec::new()
        }

        fn setup(&mut self, source: &EventSource) -> Result<()> {
            self.log.lock().unwrap().push(format!("setup {}", source.n_events()));
            Ok(())
        }

        fn process(&mut self, record: &EventRecord<'_>, _ctx: &mut EventContext) -> Result<()> {
            if Some(record.index) == self.fail_at {
                return Err(AnalysisError::stage("recorder", "boom"));
            }
            self.log.lock().unwrap().push(format!("event {}", record.entry));
            Ok(())
        }

        fn teardown(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("teardown".into());
            Ok(())
        }
    }

    fn source(storage: &MemoryStorage) -> EventSource {
        let dataset = Arc::new(Dataset::new("ds", ["a.jsonl"]));
        let config = WorkUnitConfig::new(vec![PathBuf::from("a.jsonl")], 1, 2, dataset).unwrap();
        EventSource::open(config, storage, Arc::new(NewlineDelimitedFormat::new())).unwrap()
    }

    #[test]
    fn test_run_lifecycle() {
        let storage = MemoryStorage::new();
        storage.add_events("a.jsonl", 4);
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut pipeline = Pipeline::new(vec![
            StageSpec::Decode {
                fields: vec![FieldSpec::new("seq", FieldKind::Int)],
            }
            .build()
            .unwrap(),
            Box::new(Recorder {
                log: log.clone(),
                fail_at: None,
            }),
        ])
        .unwrap();

        let mut seqs = Vec::new();
        let processed = pipeline
            .run(&mut source(&storage), &mut |ctx| {
                seqs.push(ctx.get("seq").cloned());
                Ok(())
            })
            .unwrap();

        assert_eq!(processed, 2);
        assert_eq!(
            seqs,
            vec![Some(FieldValue::Int(1)), Some(FieldValue::Int(2))]
        );
        assert_eq!(
            *log.lock().unwrap(),
            vec!["setup 2", "event 1", "event 2", "teardown"]
        );
    }

    #[test]
    fn test_teardown_runs_after_failure() {
        let storage = MemoryStorage::new();
        storage.add_events("a.jsonl", 4);
        let log = Arc::new(Mutex::new(Vec::new()));

        let recorder: Box<dyn Stage> = Box::new(Recorder {
            log: log.clone(),
            fail_at: Some(1),
        });
        let mut pipeline = Pipeline::new(vec![recorder]).unwrap();

        let err = pipeline
            .run(&mut source(&storage), &mut |_| Ok(()))
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Stage { .. }));
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("teardown"));
    }

    struct BrokenSetup;

    impl Stage for BrokenSetup {
        fn name(&self) -> &str {
            "broken"
        }

        fn requires(&self) -> Vec<FieldSpec> {
            Vec::new()
        }

        fn provides(&self) -> Vec<FieldSpec> {
            Vec::new()
        }

        fn setup(&mut self, _source: &EventSource) -> Result<()> {
            Err(AnalysisError::stage("broken", "cannot set up"))
        }

        fn process(&mut self, _record: &EventRecord<'_>, _ctx: &mut EventContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_setup_tears_down_earlier_stages() {
        let storage = MemoryStorage::new();
        storage.add_events("a.jsonl", 4);
        let first = Arc::new(Mutex::new(Vec::new()));
        let last = Arc::new(Mutex::new(Vec::new()));

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(Recorder {
                log: first.clone(),
                fail_at: None,
            }),
            Box::new(BrokenSetup),
            Box::new(Recorder {
                log: last.clone(),
                fail_at: None,
            }),
        ];
        let mut pipeline = Pipeline::new(stages).unwrap();

        let err = pipeline
            .run(&mut source(&storage), &mut |_| Ok(()))
            .unwrap_err();

        assert!(err.to_string().contains("cannot set up"));
        assert_eq!(*first.lock().unwrap(), vec!["setup 2", "teardown"]);
        assert!(last.lock().unwrap().is_empty());
    }

    #[test]
    fn test_profiling_counts_stage_calls() {
        let storage = MemoryStorage::new();
        storage.add_events("a.jsonl", 4);

        let mut pipeline = Pipeline::from_specs(&[decode(&[("seq", FieldKind::Int)])])
            .unwrap()
            .with_profiling();
        pipeline.run(&mut source(&storage), &mut |_| Ok(())).unwrap();

        let timings = pipeline.stage_timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].name, "decode");
        assert_eq!(timings[0].calls, 2);
    }

    #[test]
    fn test_no_timings_without_profiling() {
        let storage = MemoryStorage::new();
        storage.add_events("a.jsonl", 4);

        let mut pipeline = Pipeline::from_specs(&[decode(&[("seq", FieldKind::Int)])]).unwrap();
        pipeline.run(&mut source(&storage), &mut |_| Ok(())).unwrap();
        assert!(pipeline.stage_timings().is_empty());
    }
}
