// rust/event-core/src/runner.rs

//! Local worker pool for work units.
//!
//! Units run on the blocking thread pool of a dedicated tokio runtime, at
//! most `processes` at a time. Each unit opens its own files, so nothing
//! mutable is shared between workers. Results are collected in dispatch
//! order regardless of completion order.

use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::error::{AnalysisError, Result};
use crate::events::EventBuilder;

pub struct ParallelRunner {
    processes: usize,
    runtime: Option<Runtime>,
}

impl ParallelRunner {
    /// Creates a runner with `processes` workers.
    ///
    /// With one worker or fewer, units run inline on the calling thread and
    /// no runtime is started.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the worker pool cannot be started.
    pub fn new(processes: usize) -> Result<Self> {
        let runtime = if processes > 1 {
            let runtime = Builder::new_multi_thread()
                .worker_threads(1)
                .max_blocking_threads(processes)
                .thread_name("twirl-worker")
                .build()
                .map_err(|e| AnalysisError::config_with_source("failed to start worker pool", e))?;
            Some(runtime)
        } else {
            None
        };

        Ok(Self { processes, runtime })
    }

    pub fn processes(&self) -> usize {
        self.processes
    }

    /// Runs `task` on every unit and returns the outputs in unit order.
    ///
    /// The first failing unit, in unit order, aborts the run with its
    /// error; units that have not started by then are cancelled. A
    /// panicking unit is reported as a worker error.
    pub fn run<T, F>(&self, units: Vec<EventBuilder>, task: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(usize, EventBuilder) -> Result<T> + Send + Sync + 'static,
    {
        let Some(runtime) = &self.runtime else {
            return units
                .into_iter()
                .enumerate()
                .map(|(i, unit)| {
                    task(i, unit).inspect_err(|e| {
                        tracing::error!(unit = i, error = %e, "work unit failed");
                    })
                })
                .collect();
        };

        let task = Arc::new(task);
        runtime.block_on(async move {
            let handles: Vec<_> = units
                .into_iter()
                .enumerate()
                .map(|(i, unit)| {
                    let task = task.clone();
                    tokio::task::spawn_blocking(move || task(i, unit))
                })
                .collect();

            let mut outputs = Vec::with_capacity(handles.len());
            let mut pending = handles.into_iter().enumerate();
            while let Some((i, handle)) = pending.next() {
                let error = match handle.await {
                    Ok(Ok(output)) => {
                        outputs.push(output);
                        continue;
                    }
                    Ok(Err(e)) => {
                        tracing::error!(unit = i, error = %e, "work unit failed");
                        e
                    }
                    Err(e) => {
                        tracing::error!(unit = i, error = %e, "work unit panicked");
                        AnalysisError::worker(i, e.to_string())
                    }
                };

                // Units still queued never start; running ones finish.
                for (_, rest) in pending {
                    rest.abort();
                }
                return Err(error);
            }
            Ok(outputs)
        })
    }
}

impl std::fmt::Debug for ParallelRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelRunner")
            .field("processes", &self.processes)
            .finish()
    }
}
