// rust/event-core/src/profile.rs

//! Wall-clock timings of work units and stages.
//!
//! Collected only when profiling is enabled. Timings use `Instant` around
//! each unit and each stage call; they are coarse diagnostics, not exact
//! accounting.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::{AnalysisError, Result};
use crate::storage::StorageBackend;
use crate::table::format_table;

/// Accumulated time spent in one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    pub name: String,
    /// Number of `process` calls.
    pub calls: u64,
    /// Wall-clock nanoseconds spent in those calls.
    pub nanos: u64,
}

impl StageTiming {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: 0,
            nanos: 0,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.nanos += duration_nanos(elapsed);
    }
}

/// Timings of one work unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitProfile {
    pub dataset: String,
    /// Position of the unit in its dataset's plan.
    pub unit: usize,
    pub events: u64,
    /// Wall-clock nanoseconds from opening the unit to the end of its pass.
    pub nanos: u64,
    pub stages: Vec<StageTiming>,
}

/// Timings of every unit of a run, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileReport {
    units: Vec<UnitProfile>,
}

impl ProfileReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: UnitProfile) {
        self.units.push(unit);
    }

    pub fn units(&self) -> &[UnitProfile] {
        &self.units
    }

    /// Stage timings summed over all units, in stage order.
    pub fn stage_totals(&self) -> Vec<StageTiming> {
        let mut totals: Vec<StageTiming> = Vec::new();
        for stage in self.units.iter().flat_map(|u| &u.stages) {
            match totals.iter_mut().find(|t| t.name == stage.name) {
                Some(total) => {
                    total.calls += stage.calls;
                    total.nanos += stage.nanos;
                }
                None => totals.push(stage.clone()),
            }
        }
        totals
    }

    /// Renders the report as two aligned tables: units, then stages.
    pub fn render(&self) -> String {
        let unit_columns = columns(&["dataset", "unit", "events", "total_ms"]);
        let unit_rows: Vec<Vec<String>> = self
            .units
            .iter()
            .map(|u| {
                vec![
                    u.dataset.clone(),
                    u.unit.to_string(),
                    u.events.to_string(),
                    millis(u.nanos),
                ]
            })
            .collect();

        let stage_columns = columns(&["stage", "calls", "total_ms", "mean_us"]);
        let stage_rows: Vec<Vec<String>> = self
            .stage_totals()
            .iter()
            .map(|s| {
                let mean = if s.calls == 0 { 0.0 } else { s.nanos as f64 / s.calls as f64 / 1e3 };
                vec![
                    s.name.clone(),
                    s.calls.to_string(),
                    millis(s.nanos),
                    format!("{mean:.3}"),
                ]
            })
            .collect();

        format!(
            "{}\n{}",
            format_table(&unit_columns, &unit_rows),
            format_table(&stage_columns, &stage_rows)
        )
    }

    /// Writes the rendered report to `path` through `storage`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be written.
    pub fn write(&self, storage: &dyn StorageBackend, path: &Path) -> Result<()> {
        let mut writer = storage.open_write(path)?;
        writer
            .write_all(self.render().as_bytes())
            .map_err(|e| AnalysisError::storage_with_source(path, "failed to write profile", e))?;
        writer.finish()?;

        tracing::info!(path = %path.display(), units = self.units.len(), "wrote profile");
        Ok(())
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn millis(nanos: u64) -> String {
    format!("{:.3}", nanos as f64 / 1e6)
}

pub(crate) fn duration_nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn stage(name: &str, calls: u64, nanos: u64) -> StageTiming {
        StageTiming {
            name: name.to_string(),
            calls,
            nanos,
        }
    }

    fn report() -> ProfileReport {
        let mut report = ProfileReport::new();
        report.push(UnitProfile {
            dataset: "zz".into(),
            unit: 0,
            events: 2,
            nanos: 3_000_000,
            stages: vec![stage("decode", 2, 4_000), stage("threshold", 2, 1_200)],
        });
        report.push(UnitProfile {
            dataset: "zz".into(),
            unit: 1,
            events: 1,
            nanos: 1_500_000,
            stages: vec![stage("decode", 1, 2_000), stage("threshold", 1, 600)],
        });
        report
    }

    #[test]
    fn test_record() {
        let mut timing = StageTiming::new("decode");
        timing.record(Duration::from_micros(3));
        timing.record(Duration::from_micros(1));
        assert_eq!(timing, stage("decode", 2, 4_000));
    }

    #[test]
    fn test_stage_totals() {
        assert_eq!(
            report().stage_totals(),
            vec![stage("decode", 3, 6_000), stage("threshold", 3, 1_800)]
        );
    }

    #[test]
    fn test_render() {
        let text = report().render();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "dataset unit events total_ms");
        assert_eq!(lines[1], "     zz    0      2    3.000");
        assert_eq!(lines[2], "     zz    1      1    1.500");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "    stage calls total_ms mean_us");
        assert_eq!(lines[5], "   decode     3    0.006   2.000");
        assert_eq!(lines[6], "threshold     3    0.002   0.600");
    }

    #[test]
    fn test_write() {
        let storage = MemoryStorage::new();
        report().write(&storage, Path::new("out/profile.txt")).unwrap();

        let written = String::from_utf8(storage.contents("out/profile.txt").unwrap()).unwrap();
        assert_eq!(written, report().render());
    }
}
