use crate::{
    collector,
    config::RunConfig,
    executors::Executors,
    layout::RunLayout,
    tasks::{self, TaskListError},
    worker::{self, WorkerContext, WorkerEnv, WorkerError},
};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Barrier,
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Tasks(#[from] TaskListError),
    #[error("failed to create output root {}", path.display())]
    OutputRoot { path: PathBuf, source: io::Error },
    #[error("failed to build the worker pool")]
    Pool(#[from] ThreadPoolBuildError),
    #[error("worker {rank} failed")]
    Worker { rank: usize, source: WorkerError },
    #[error("failed to write combined output {}", path.display())]
    CombinedOutput { path: PathBuf, source: io::Error },
}

/// end-of-run accounting, mostly for the final log line
#[derive(Debug)]
pub struct RunSummary {
    pub tasks: usize,
    pub completed: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub combined_output: PathBuf,
}

/// run one batch submission to completion
///
/// The worker pool is sized exactly to the configured worker count and
/// `broadcast` runs one worker body per pool thread, so every worker owns
/// a fixed `(rank, total)` for the whole run. The broadcast return is the
/// collective gather: it blocks until the last worker finishes and hands
/// back the reports in rank order.
pub fn run(config: &RunConfig, task_list: &Path, job_index: u64) -> Result<RunSummary, RunError> {
    let tasks = tasks::load(task_list)?;
    let layout = RunLayout::new(config.paths.output_root.clone(), job_index);
    let executors = Executors::load(&config.simulator);
    let workers = config.execution.workers;

    info!(
        workers,
        job_index,
        tasks = tasks.len(),
        "Starting batch run"
    );

    fs::create_dir_all(layout.output_root()).map_err(|source| RunError::OutputRoot {
        path: layout.output_root().to_path_buf(),
        source,
    })?;

    let pool = build_pool(workers, config.execution.pin_workers)?;
    let setup_barrier = Barrier::new(workers);
    let env = WorkerEnv {
        config,
        layout: &layout,
        executors: &executors,
        setup_barrier: &setup_barrier,
    };

    let gathered = pool.broadcast(|broadcast| {
        let ctx = WorkerContext::new(broadcast.index(), broadcast.num_threads());
        let assigned = tasks::partition(&tasks, ctx.rank, ctx.total);

        worker::run_worker(ctx, &env, &assigned)
    });

    let mut reports = Vec::with_capacity(gathered.len());
    for (rank, report) in gathered.into_iter().enumerate() {
        reports.push(report.map_err(|source| RunError::Worker { rank, source })?);
    }

    let mut summary = RunSummary {
        tasks: tasks.len(),
        completed: 0,
        timed_out: 0,
        failed: 0,
        combined_output: layout.combined_output(),
    };
    for report in reports.iter() {
        summary.completed += report.completed;
        summary.timed_out += report.timed_out;
        summary.failed += report.failed;
    }

    let results = collector::reassemble(reports);
    collector::write_combined(&summary.combined_output, &results).map_err(|source| {
        RunError::CombinedOutput {
            path: summary.combined_output.clone(),
            source,
        }
    })?;

    info!(
        "Wrote {} results to {}",
        results.len(),
        summary.combined_output.display()
    );

    Ok(summary)
}

fn build_pool(workers: usize, pin_workers: bool) -> Result<ThreadPool, ThreadPoolBuildError> {
    let builder = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|rank| format!("worker-{rank}"));

    if pin_workers {
        builder
            .start_handler(|rank| {
                if affinity::set_thread_affinity(&[rank]).is_err() {
                    warn!(rank, "Failed to pin worker thread to a core");
                }
            })
            .build()
    } else {
        builder.build()
    }
}
