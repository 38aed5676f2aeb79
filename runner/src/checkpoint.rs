use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

/// Append-only audit trail of one worker's task outcomes
///
/// Entries are three lines each: the task index, the wall-clock execution
/// time and the formatted output. The file is opened in append mode per
/// write, so a crash mid-run loses at most the in-flight entry. Nothing
/// ever reads these files back; they exist for manual inspection of
/// partial runs.
#[derive(Debug)]
pub struct CheckpointWriter {
    path: PathBuf,
}

impl CheckpointWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, index: i64, elapsed: Duration, output: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{index}")?;
        writeln!(file, "Execution time: {} seconds", elapsed.as_secs_f64())?;
        writeln!(file, "{output}")?;

        Ok(())
    }
}
