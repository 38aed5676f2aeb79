use serde::{Deserialize, Serialize};
use std::{fs::File, io::Error, os::unix::fs::MetadataExt, path::PathBuf};
use thiserror::Error;
use tracing::{error, warn};

// check if a file is executable
pub fn check_executable(path: &PathBuf) -> Result<bool, ConfigError> {
    if !path.is_file() {
        Err(ConfigError::FileNotFound)
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigError::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to open run configuration")]
    Io(#[from] Error),
    #[error("failed to parse run configuration")]
    Parse(#[from] serde_yaml::Error),
    #[error("file not found")]
    FileNotFound,
    #[error("metadata not found")]
    MetadataNotFound(#[source] Error),
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    // the external simulation executable and its input deck
    pub simulator: SimulatorConfig,
    // worker pool sizing, timeout and scratch handling
    #[serde(default)]
    pub execution: ExecutionConfig,
    pub paths: PathsConfig,
    // what survives of timed-out and failed tasks
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    pub exec: PathBuf,
    #[serde(default)]
    pub params: Vec<String>,
    // input deck template, rendered per task by placeholder substitution
    #[serde(default = "default_payload")]
    pub payload: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    // wall-clock limit per simulator invocation, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub pin_workers: bool,
    // give every task its own scratch subdirectory instead of sharing
    // one directory per worker rank
    #[serde(default)]
    pub isolate_tasks: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: default_timeout(),
            pin_workers: false,
            isolate_tasks: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub output_root: PathBuf,
}

/// what to do with the output of a task that did not succeed
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// checkpoint entry and combined-output inclusion
    Keep,
    /// checkpoint entry only
    Checkpoint,
    /// no trace outside the log stream
    Drop,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    #[serde(default = "default_timeout_retention")]
    pub timeouts: Retention,
    #[serde(default = "default_failure_retention")]
    pub failures: Retention,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            timeouts: default_timeout_retention(),
            failures: default_failure_retention(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &PathBuf) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_reader(File::open(path)?)?)
    }

    pub fn preflight_checks(&self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make
        // debugging easier for users
        let mut contains_error = false;

        if self.execution.workers == 0 {
            error!("execution.workers cannot be 0, there would be nobody to run tasks");
            contains_error = true;
        }

        if self.execution.timeout == 0 {
            error!("execution.timeout cannot be 0. Every invocation would be killed immediately");
            contains_error = true;
        }

        if !self.simulator.payload.contains("{attribute1}")
            && !self.simulator.payload.contains("{attribute2}")
        {
            warn!("simulator.payload references neither task attribute, every task gets an identical input deck");
        }

        match check_executable(&self.simulator.exec) {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    "simulator.exec target {} is not executable, this might cause problems",
                    self.simulator.exec.to_string_lossy()
                );
                contains_error = true;
            }
            Err(e) => {
                error!(
                    "Failed to find simulator.exec. Either not a file or not readable at {}: {e}",
                    self.simulator.exec.to_string_lossy()
                );
                contains_error = true;
            }
        }

        contains_error
    }
}

fn default_payload() -> String {
    String::from("attribute1 {attribute1}\nattribute2 {attribute2}\n")
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    1800
}

fn default_timeout_retention() -> Retention {
    Retention::Checkpoint
}

fn default_failure_retention() -> Retention {
    Retention::Drop
}
