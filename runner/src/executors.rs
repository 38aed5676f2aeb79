pub mod process;

use crate::config::SimulatorConfig;
use std::{
    path::Path,
    process::ExitStatus,
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("failed to spawn simulator process")]
    Spawn(#[source] std::io::Error),
    #[error("failed to stream the input deck to the simulator")]
    Stdin(#[source] std::io::Error),
    #[error("failed while waiting on the simulator process")]
    Wait(#[source] std::io::Error),
    #[error("failed to stop a timed-out simulator process")]
    Kill(#[source] std::io::Error),
    #[error("failed to capture simulator output")]
    Capture(#[source] std::io::Error),
}

/// one simulator invocation: the rendered input deck, the directory the
/// process runs in, and the wall-clock limit
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub payload: &'a str,
    pub workdir: &'a Path,
    pub timeout: Duration,
}

/// captured streams and exit status of a finished invocation
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub runtime: Duration,
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

/// what became of one invocation within the wall-clock limit
#[derive(Debug)]
pub enum RunOutcome {
    /// the process exited on its own, successfully or not
    Completed(RunOutput),
    /// the wall-clock limit expired and the process was killed
    TimedOut { runtime: Duration },
}

/// All executor variants
/// (this is deliberately not made with dynamic dispatch to avoid the headache)
#[derive(Debug, Clone)]
pub enum Executors {
    Process(process::ProcessExecutor),
}

impl Executors {
    pub fn load(config: &SimulatorConfig) -> Self {
        Self::Process(process::ProcessExecutor::new(
            config.exec.clone(),
            config.params.clone(),
        ))
    }

    pub fn run(&self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError> {
        match self {
            Self::Process(executor) => executor.run(invocation),
        }
    }
}
