//! Parallel dispatch of conversion jobs.
//!
//! Step 3 of a conversion run. Takes the planned [`ConversionTask`]s, runs
//! [`convert_file`] for each on a dedicated rayon pool, and folds the
//! outcomes into a [`RunSummary`]:
//!
//! ```text
//! plan ──→ [task, task, task, …] ──par_iter──→ [outcome, outcome, …] ──→ RunSummary
//!                                       │
//!                                       └──→ ProcessEvent channel (progress)
//! ```
//!
//! ## Guarantees
//!
//! - Every task produces exactly one outcome, so
//!   `converted + skipped + failed == tasks.len()`.
//! - A failing or panicking job is recorded and the others carry on.
//! - Failures are listed in task (walk) order, whatever order workers finish.
//! - Tasks that share an output path (`IMG.heic` and `IMG.HEIF`) never race:
//!   the first in walk order converts, the rest fail without running.
//! - The pool is built per call; nothing touches rayon's global pool.

use crate::config::{ConvertConfig, ProcessingConfig, effective_threads};
use crate::convert::{ConversionOptions, ConversionOutcome, convert_file};
use crate::imaging::ImageBackend;
use crate::scan::{self, ConversionTask, ScanError};
use rayon::prelude::*;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot start worker pool: {0}")]
    ThreadPool(String),
}

/// Progress events sent while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    /// Sent once before any job starts.
    Started { total: usize, threads: usize },
    /// Sent as each job ends, in completion order.
    FileFinished {
        /// 1-based position of the task in walk order.
        index: usize,
        total: usize,
        relative: PathBuf,
        outcome: ConversionOutcome,
    },
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Source path (relative to the source root) and reason, in walk order.
    pub failures: Vec<(PathBuf, String)>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.converted + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn record(&mut self, relative: PathBuf, outcome: ConversionOutcome) {
        match outcome {
            ConversionOutcome::Converted => self.converted += 1,
            ConversionOutcome::SkippedExisting => self.skipped += 1,
            ConversionOutcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push((relative, reason));
            }
        }
    }
}

/// Turn a caught panic payload into a failure reason.
fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {message}")
}

/// For each task, the failure reason if an earlier task already claims its
/// output path.
fn output_collisions(tasks: &[ConversionTask]) -> Vec<Option<String>> {
    let mut claimed: HashMap<&Path, &Path> = HashMap::with_capacity(tasks.len());
    tasks
        .iter()
        .map(|task| match claimed.get(task.target.as_path()) {
            Some(first) => {
                tracing::warn!(
                    source = %task.source.relative.display(),
                    first = %first.display(),
                    "output path already claimed"
                );
                Some(format!("output path collides with {}", first.display()))
            }
            None => {
                claimed.insert(&task.target, &task.source.relative);
                None
            }
        })
        .collect()
}

/// Convert every task on a pool of `threads` workers (`0` = auto).
pub fn process(
    backend: &impl ImageBackend,
    tasks: &[ConversionTask],
    options: &ConversionOptions,
    threads: usize,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunSummary, ProcessError> {
    let threads = effective_threads(&ProcessingConfig { threads });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("heic-convert-{i}"))
        .build()
        .map_err(|e| ProcessError::ThreadPool(e.to_string()))?;

    let total = tasks.len();
    if let Some(tx) = &events {
        tx.send(ProcessEvent::Started { total, threads }).ok();
    }
    tracing::debug!(total, threads, "starting conversion");
    let collisions = output_collisions(tasks);

    let outcomes: Vec<ConversionOutcome> = pool.install(|| {
        tasks
            .par_iter()
            .zip(collisions.par_iter())
            .enumerate()
            .map(|(i, (task, collision))| {
                let outcome = match collision {
                    Some(reason) => ConversionOutcome::Failed(reason.clone()),
                    None => catch_unwind(AssertUnwindSafe(|| convert_file(backend, task, options)))
                        .unwrap_or_else(|payload| {
                            ConversionOutcome::Failed(panic_reason(&*payload))
                        }),
                };

                if let Some(tx) = &events {
                    tx.send(ProcessEvent::FileFinished {
                        index: i + 1,
                        total,
                        relative: task.source.relative.clone(),
                        outcome: outcome.clone(),
                    })
                    .ok();
                }
                outcome
            })
            .collect()
    });

    let mut summary = RunSummary::default();
    for (task, outcome) in tasks.iter().zip(outcomes) {
        summary.record(task.source.relative.clone(), outcome);
    }
    Ok(summary)
}

/// Plan and convert a whole tree as described by `config`.
///
/// Creates the destination root first. A missing source root fails before
/// any job runs.
pub fn convert_tree(
    backend: &impl ImageBackend,
    config: &ConvertConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<RunSummary, ProcessError> {
    let options = config.options();
    let tasks = scan::plan(
        &config.paths.source,
        &config.paths.dest,
        config.scan.recursive,
        options.format,
    )?;
    std::fs::create_dir_all(&config.paths.dest)?;
    process(
        backend,
        &tasks,
        &options,
        config.processing.threads,
        events,
    )
}
