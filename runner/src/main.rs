use clap::Parser;
use simbatch_runner::{batch, config::RunConfig};
use std::{env, error::Error, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Dispatch a batch of simulator invocations across a fixed worker pool
/// and combine their outputs in task order.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// run configuration (YAML)
    config: PathBuf,
    /// task list, one `<attr1> <attr2> <index>` record per line
    tasks: PathBuf,
    /// override the configured number of workers
    #[arg(long)]
    workers: Option<usize>,
    /// job-array index namespacing this submission's files
    #[arg(long)]
    job_index: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match RunConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(
                "Failed to load configuration from {}: {e}",
                cli.config.display()
            );
            exit(1);
        }
    };

    if let Some(workers) = cli.workers {
        config.execution.workers = workers;
    }

    if config.preflight_checks() {
        exit(1);
    }

    match nix::unistd::gethostname() {
        Ok(hostname) => info!("Running on {}", hostname.to_string_lossy()),
        Err(error) => warn!(?error, "Failed to retrieve hostname"),
    }

    let job_index = cli.job_index.unwrap_or_else(job_index_from_env);

    match batch::run(&config, &cli.tasks, job_index) {
        Ok(summary) => info!(
            completed = summary.completed,
            timed_out = summary.timed_out,
            failed = summary.failed,
            "Done with processing"
        ),
        Err(e) => {
            error!("Run failed: {e}");
            let mut cause = e.source();
            while let Some(inner) = cause {
                error!("  caused by: {inner}");
                cause = inner.source();
            }
            exit(1);
        }
    }
}

// the scheduler exports the array index per submission; a missing or
// unparsable value falls back to 0
fn job_index_from_env() -> u64 {
    env::var("SLURM_ARRAY_TASK_ID")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}
