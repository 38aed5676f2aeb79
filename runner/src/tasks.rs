use std::{fs, path::Path};
use thiserror::Error;
use tracing::debug;


#[derive(Error, Debug)]
pub enum TaskListError {
    #[error("failed to read task list")]
    Io(#[from] std::io::Error),
    #[error("malformed record at line {line}: expected `<attr1> <attr2> <index>`")]
    MalformedRecord { line: usize },
}

/// One unit of work: two integer attributes parameterizing the simulator
/// input plus the task's position in the global ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub attribute1: i64,
    pub attribute2: i64,
    pub index: i64,
}

/// load the full task list from a whitespace-separated text file
///
/// Each non-empty line must carry at least three integer tokens; anything
/// after the third token is ignored. Any malformed line aborts the load,
/// there are no partial task lists.
pub fn load(path: &Path) -> Result<Vec<Task>, TaskListError> {
    let data = fs::read_to_string(path)?;
    let mut tasks = Vec::new();

    for (number, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line
            .split_whitespace()
            .take(3)
            .map(|token| token.parse::<i64>());

        match (fields.next(), fields.next(), fields.next()) {
            (Some(Ok(attribute1)), Some(Ok(attribute2)), Some(Ok(index))) => tasks.push(Task {
                attribute1,
                attribute2,
                index,
            }),
            _ => return Err(TaskListError::MalformedRecord { line: number + 1 }),
        }
    }

    debug!("Loaded {} tasks from {}", tasks.len(), path.display());

    Ok(tasks)
}

/// fixed-stride slice of the global task list owned by one worker
///
/// Worker `rank` of `total` owns the tasks at global positions
/// `rank, rank + total, rank + 2 * total, ...` in global order. Requires
/// no communication and is deterministic for a given worker count.
pub fn partition(tasks: &[Task], rank: usize, total: usize) -> Vec<Task> {
    debug_assert!(total > 0 && rank < total);

    tasks.iter().skip(rank).step_by(total).copied().collect()
}
