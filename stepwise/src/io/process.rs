//! Child processes with timeouts and bounded output capture.
//!
//! Spawning and waiting are separate so callers can hold a handle between the
//! two. Output pipes are drained on reader threads from spawn onwards, so a
//! chatty child never blocks on a full pipe while nobody waits on it.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

type Reader = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exit code, if the child exited normally.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// A spawned child whose output is being drained in the background.
#[derive(Debug)]
pub struct RunningCommand {
    child: Child,
    stdout: Reader,
    stderr: Reader,
}

impl RunningCommand {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Block until the child exits or `timeout` elapses (then kill it).
    #[instrument(skip_all, fields(pid = self.child.id(), timeout_secs = timeout.as_secs()))]
    pub fn wait(mut self, timeout: Duration) -> Result<CommandOutput> {
        let mut timed_out = false;
        let status = match self.child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "command timed out, killing"
                );
                timed_out = true;
                self.child.kill().context("kill command")?;
                self.child.wait().context("wait command after kill")?
            }
        };

        let (stdout, stdout_truncated) = join_output(self.stdout).context("join stdout")?;
        let (stderr, stderr_truncated) = join_output(self.stderr).context("join stderr")?;
        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(stdout_truncated, stderr_truncated, "output truncated");
        }

        debug!(exit_code = ?status.code(), timed_out, "command finished");
        Ok(CommandOutput {
            status,
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            timed_out,
        })
    }
}

/// Spawn `cmd` with stdin closed and stdout/stderr captured.
///
/// `output_limit_bytes` bounds how much of each stream is kept in memory;
/// bytes beyond it are discarded while the pipe keeps draining.
#[instrument(skip_all, fields(output_limit_bytes))]
pub fn spawn_captured(mut cmd: Command, output_limit_bytes: usize) -> Result<RunningCommand> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    Ok(RunningCommand {
        child,
        stdout: thread::spawn(move || read_stream_limited(stdout, output_limit_bytes)),
        stderr: thread::spawn(move || read_stream_limited(stderr, output_limit_bytes)),
    })
}

fn join_output(handle: Reader) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        let keep = n.min(remaining);
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}
