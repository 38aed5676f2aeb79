use crate::{
    checkpoint::CheckpointWriter,
    config::{Retention, RunConfig},
    executors::{ExecutorError, Executors, Invocation, RunOutcome},
    layout::RunLayout,
    tasks::Task,
};
use std::{fs, io, path::PathBuf, sync::Barrier, time::Duration};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to create checkpoint directory {}", path.display())]
    Setup {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to prepare scratch directory {}", path.display())]
    Scratch {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to append to checkpoint file {}", path.display())]
    Checkpoint {
        path: PathBuf,
        source: io::Error,
    },
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// identity of one worker inside the fixed pool, injected at startup so
/// partition and path computations stay pure functions of it
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext {
    pub rank: usize,
    pub total: usize,
}

impl WorkerContext {
    pub fn new(rank: usize, total: usize) -> Self {
        Self { rank, total }
    }

    /// rank 0 creates shared directories and owns the combined output
    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }
}

/// everything a worker needs beyond its own identity
pub struct WorkerEnv<'a> {
    pub config: &'a RunConfig,
    pub layout: &'a RunLayout,
    pub executors: &'a Executors,
    /// passed by every worker between directory setup and the first
    /// checkpoint write
    pub setup_barrier: &'a Barrier,
}

/// one retained task result, paired with its global index for the final
/// reassembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub index: i64,
    pub output: String,
}

/// what one worker hands to the collector after its loop
#[derive(Debug, Default)]
pub struct WorkerReport {
    pub results: Vec<TaskResult>,
    pub completed: usize,
    pub timed_out: usize,
    pub failed: usize,
}

/// render the input deck for one task by placeholder substitution
pub fn render_payload(template: &str, task: &Task) -> String {
    template
        .replace("{attribute1}", &task.attribute1.to_string())
        .replace("{attribute2}", &task.attribute2.to_string())
        .replace("{index}", &task.index.to_string())
}

/// the per-worker task loop: run every assigned task in order, checkpoint
/// as configured and collect the results to gather
pub fn run_worker(
    ctx: WorkerContext,
    env: &WorkerEnv,
    tasks: &[Task],
) -> Result<WorkerReport, WorkerError> {
    info!(rank = ctx.rank, assigned = tasks.len(), "Worker started");

    // the coordinator creates the shared checkpoint directory exactly
    // once; nobody may write a checkpoint before the barrier is passed
    let setup = if ctx.is_coordinator() {
        fs::create_dir_all(env.layout.checkpoint_dir())
    } else {
        Ok(())
    };
    env.setup_barrier.wait();
    setup.map_err(|source| WorkerError::Setup {
        path: env.layout.checkpoint_dir(),
        source,
    })?;

    let checkpoint = CheckpointWriter::new(env.layout.checkpoint_file(ctx.rank));
    let timeout = Duration::from_secs(env.config.execution.timeout);
    let mut report = WorkerReport::default();

    for task in tasks {
        let workdir = if env.config.execution.isolate_tasks {
            env.layout.task_scratch_dir(ctx.rank, task.index)
        } else {
            env.layout.scratch_dir(ctx.rank)
        };
        // idempotent, the directory is reused across tasks unless
        // isolation is on
        fs::create_dir_all(&workdir).map_err(|source| WorkerError::Scratch {
            path: workdir.clone(),
            source,
        })?;

        let payload = render_payload(&env.config.simulator.payload, task);
        debug!(
            "Processing task {} with timeout {}s in {}",
            task.index,
            timeout.as_secs(),
            workdir.display()
        );

        let outcome = env.executors.run(&Invocation {
            payload: &payload,
            workdir: &workdir,
            timeout,
        })?;

        match outcome {
            RunOutcome::Completed(output) if output.status.success() => {
                let formatted = format!(
                    "Output for attribute1 {} and attribute2 {}: {}",
                    task.attribute1, task.attribute2, output.stdout
                );
                debug!(
                    "Finished task {} in {} ms | status: {}",
                    task.index,
                    output.runtime.as_millis(),
                    output.status.success()
                );

                append_entry(&checkpoint, task.index, output.runtime, &formatted)?;
                report.results.push(TaskResult {
                    index: task.index,
                    output: formatted,
                });
                report.completed += 1;
            }
            RunOutcome::Completed(output) => {
                error!(
                    index = task.index,
                    status = %output.status,
                    stdout = %output.stdout,
                    stderr = %output.stderr,
                    "Simulator run failed"
                );

                let formatted = format!(
                    "Output for attribute1 {} and attribute2 {}: failed with {}",
                    task.attribute1, task.attribute2, output.status
                );
                retain(
                    env.config.retention.failures,
                    &checkpoint,
                    &mut report,
                    task,
                    output.runtime,
                    formatted,
                )?;
                report.failed += 1;
            }
            RunOutcome::TimedOut { runtime } => {
                warn!(
                    "Execution timed out for {} and attribute2 {}",
                    task.attribute1, task.attribute2
                );

                let formatted = format!(
                    "Output for {} and attribute2 {}: timeout",
                    task.attribute1, task.attribute2
                );
                retain(
                    env.config.retention.timeouts,
                    &checkpoint,
                    &mut report,
                    task,
                    runtime,
                    formatted,
                )?;
                report.timed_out += 1;
            }
        }
    }

    info!(
        rank = ctx.rank,
        completed = report.completed,
        timed_out = report.timed_out,
        failed = report.failed,
        "Worker finished"
    );

    Ok(report)
}

/// apply the configured retention policy to a non-successful outcome
fn retain(
    policy: Retention,
    checkpoint: &CheckpointWriter,
    report: &mut WorkerReport,
    task: &Task,
    elapsed: Duration,
    formatted: String,
) -> Result<(), WorkerError> {
    match policy {
        Retention::Keep => {
            append_entry(checkpoint, task.index, elapsed, &formatted)?;
            report.results.push(TaskResult {
                index: task.index,
                output: formatted,
            });
        }
        Retention::Checkpoint => append_entry(checkpoint, task.index, elapsed, &formatted)?,
        Retention::Drop => {}
    }

    Ok(())
}

fn append_entry(
    checkpoint: &CheckpointWriter,
    index: i64,
    elapsed: Duration,
    output: &str,
) -> Result<(), WorkerError> {
    checkpoint
        .append(index, elapsed, output)
        .map_err(|source| WorkerError::Checkpoint {
            path: checkpoint.path().to_path_buf(),
            source,
        })
}
