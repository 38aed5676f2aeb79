use super::{ExecutorError, Invocation, RunOutcome, RunOutput};
use std::{
    io::{self, Read, Write},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
    time::Instant,
};
use tracing::{debug, trace};
use tracing_unwrap::OptionExt;
use wait_timeout::ChildExt;

/// Executor that spawns the simulator as a child process
///
/// The input deck is streamed over stdin and the pipe closed so the
/// simulator sees a clear end of input. Stdout and stderr are drained on
/// dedicated threads while waiting; without that a chatty simulator fills
/// the pipe buffer and never exits.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    exec: PathBuf,
    params: Vec<String>,
}

impl ProcessExecutor {
    pub fn new(exec: PathBuf, params: Vec<String>) -> Self {
        Self { exec, params }
    }

    pub fn run(&self, invocation: &Invocation) -> Result<RunOutcome, ExecutorError> {
        let start = Instant::now();

        let mut child = Command::new(&self.exec)
            .args(self.params.iter())
            .current_dir(invocation.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExecutorError::Spawn)?;

        debug!("Simulator waiting on {}", child.id());

        let mut stdin = child.stdin.take().unwrap_or_log();
        match stdin.write_all(invocation.payload.as_bytes()) {
            Ok(()) => {}
            // the simulator may exit without draining its stdin; its exit
            // status already tells that story
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => {
                debug!("Simulator closed stdin before the full input deck was delivered");
            }
            Err(error) => return Err(ExecutorError::Stdin(error)),
        }
        // Dropping stdin here will close the underlying file descriptor
        drop(stdin);

        let stdout = spawn_reader(child.stdout.take().unwrap_or_log());
        let stderr = spawn_reader(child.stderr.take().unwrap_or_log());

        match child
            .wait_timeout(invocation.timeout)
            .map_err(ExecutorError::Wait)?
        {
            Some(status) => {
                let runtime = start.elapsed();
                let stdout = join_reader(stdout)?;
                let stderr = join_reader(stderr)?;

                trace!("Output: {stdout}");

                Ok(RunOutcome::Completed(RunOutput {
                    runtime,
                    stdout,
                    stderr,
                    status,
                }))
            }
            None => {
                // child hasn't exited yet, kill and reap it
                child.kill().map_err(ExecutorError::Kill)?;
                child.wait().map_err(ExecutorError::Wait)?;
                // the captured streams are discarded; orphaned descendants
                // may still hold the pipes, so the readers are not joined
                drop(stdout);
                drop(stderr);

                Ok(RunOutcome::TimedOut {
                    runtime: start.elapsed(),
                })
            }
        }
    }
}

fn spawn_reader<R>(mut stream: R) -> thread::JoinHandle<std::io::Result<String>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = String::new();
        stream.read_to_string(&mut buffer)?;
        Ok(buffer)
    })
}

fn join_reader(
    handle: thread::JoinHandle<std::io::Result<String>>,
) -> Result<String, ExecutorError> {
    handle
        .join()
        .expect("output reader thread panicked")
        .map_err(ExecutorError::Capture)
}
