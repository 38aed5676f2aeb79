use crate::worker::{TaskResult, WorkerReport};
use itertools::Itertools;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};
use tracing::debug;

/// flatten the gathered per-worker reports and restore global task order
///
/// Gather arrival order carries no meaning; the sort by index is the only
/// thing that makes the combined file deterministic.
pub fn reassemble(reports: Vec<WorkerReport>) -> Vec<TaskResult> {
    reports
        .into_iter()
        .flat_map(|report| report.results)
        .sorted_by_key(|result| result.index)
        .collect_vec()
}

/// write the combined output file: an index line followed by an output
/// line per retained task, ascending by index
pub fn write_combined(path: &Path, results: &[TaskResult]) -> io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    for result in results {
        writeln!(file, "{}", result.index)?;
        writeln!(file, "{}", result.output)?;
    }

    file.flush()?;

    debug!("Combined {} results into {}", results.len(), path.display());

    Ok(())
}
