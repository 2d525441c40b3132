//! Start/stride batch scheduler.
//!
//! A batch of R rows is split across N workers: worker `i` handles rows
//! `i, i + N, i + 2N, ...`. The assignment is a pure function of `(i, N, R)`, so
//! workers never coordinate and every row is owned by exactly one worker.
//!
//! Each worker runs on its own thread of a dedicated rayon pool, opens whatever
//! per-worker resources the job needs, and reports the outcome of every row. A
//! failing or panicking row does not stop the rest of that worker's shard; a
//! worker that panics while opening its resources is caught and reported.

use std::any::Any;
use std::iter::StepBy;
use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{PlotError, Result};

/// Rows owned by `worker` out of `workers` for a batch of `rows`
///
/// `workers` must be non-zero.
pub fn shard_rows(worker: usize, workers: usize, rows: usize) -> StepBy<Range<usize>> {
    (worker.min(rows)..rows).step_by(workers.max(1))
}

/// Successful result of processing one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Rendered(PathBuf),
    /// Output already existed and was left untouched
    Skipped(PathBuf),
}

#[derive(Debug)]
pub struct RowFailure {
    pub row: usize,
    pub error: PlotError,
}

/// A unit of sharded work: a row count plus per-row processing
///
/// `Worker` holds per-worker resources such as a database connection. It is
/// created on the worker's own thread and never shared.
pub trait ShardedJob: Sync {
    type Worker;

    fn row_count(&self) -> usize;

    fn open_worker(&self, worker: usize) -> Result<Self::Worker>;

    fn process_row(&self, worker: &mut Self::Worker, row: usize) -> Result<RowOutcome>;
}

/// What one worker did with its shard
#[derive(Debug, Default)]
pub struct WorkerReport {
    pub worker: usize,
    pub rendered: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<RowFailure>,
    /// Set when the worker could not open its resources
    pub fatal: Option<String>,
}

impl WorkerReport {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.fatal.is_none()
    }
}

/// Collected results of a batch, one report per worker
#[derive(Debug, Default)]
pub struct BatchReport {
    pub workers: Vec<WorkerReport>,
}

impl BatchReport {
    pub fn rendered(&self) -> usize {
        self.workers.iter().map(|w| w.rendered.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.workers.iter().map(|w| w.skipped.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.workers.iter().map(|w| w.failures.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowFailure> {
        self.workers.iter().flat_map(|w| w.failures.iter())
    }

    /// Workers that never finished their shard
    pub fn fatal_workers(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers.iter().filter(|w| w.fatal.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.workers.iter().all(WorkerReport::is_clean)
    }
}

/// Runs a [`ShardedJob`] across a fixed number of workers
#[derive(Debug, Clone, Copy)]
pub struct BatchScheduler {
    workers: usize,
}

impl BatchScheduler {
    /// `None` uses one worker per logical CPU
    pub fn new(workers: Option<usize>) -> Result<Self> {
        let workers = workers.unwrap_or_else(num_cpus::get);
        if workers == 0 {
            return Err(PlotError::InvalidWorkerCount(workers));
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every shard to completion and collect the reports, ordered by worker index
    pub fn run<J: ShardedJob>(&self, job: &J) -> Result<BatchReport> {
        let rows = job.row_count();
        info!(
            "Scheduling {} rows across {} workers",
            rows, self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("varplot-worker-{i}"))
            .build()
            .map_err(|e| PlotError::io("rayon thread pool", std::io::Error::other(e)))?;

        let workers = self.workers;
        let reports: Vec<WorkerReport> = pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|worker| {
                    catch_unwind(AssertUnwindSafe(|| run_shard(job, worker, workers, rows)))
                        .unwrap_or_else(|panic| {
                            let message = panic_message(panic.as_ref());
                            warn!("Worker {} panicked: {}", worker, message);
                            WorkerReport {
                                fatal: Some(format!("panicked: {message}")),
                                ..WorkerReport::new(worker)
                            }
                        })
                })
                .collect()
        });

        let report = BatchReport { workers: reports };
        info!(
            "Batch finished: {} rendered, {} skipped, {} failed",
            report.rendered(),
            report.skipped(),
            report.failed()
        );
        Ok(report)
    }
}

fn run_shard<J: ShardedJob>(job: &J, worker: usize, workers: usize, rows: usize) -> WorkerReport {
    let mut report = WorkerReport::new(worker);
    let mut shard = shard_rows(worker, workers, rows).peekable();
    if shard.peek().is_none() {
        return report;
    }

    let mut state = match job.open_worker(worker) {
        Ok(state) => state,
        Err(e) => {
            warn!("Worker {} failed to start: {}", worker, e);
            report.fatal = Some(e.to_string());
            return report;
        }
    };

    info!("Worker {} started", worker);
    for row in shard {
        let outcome = catch_unwind(AssertUnwindSafe(|| job.process_row(&mut state, row)))
            .unwrap_or_else(|panic| {
                Err(PlotError::RowPanicked {
                    message: panic_message(panic.as_ref()),
                })
            });
        match outcome {
            Ok(RowOutcome::Rendered(path)) => {
                debug!("{} ... done", path.display());
                report.rendered.push(path);
            }
            Ok(RowOutcome::Skipped(path)) => {
                debug!("{} ... skip", path.display());
                report.skipped.push(path);
            }
            Err(error) => {
                warn!("Worker {} failed on row {}: {}", worker, row, error);
                report.failures.push(RowFailure { row, error });
            }
        }
    }
    info!(
        "Worker {} finished: {} rendered, {} skipped, {} failed",
        worker,
        report.rendered.len(),
        report.skipped.len(),
        report.failures.len()
    );

    report
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
