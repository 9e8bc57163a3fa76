//! Raw command-execution primitive.
//!
//! The [`CommandRunner`] trait decouples the retrying executor from how shell
//! commands actually run. Tests use scripted runners that return predetermined
//! output without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::io::process::{CommandOutput, RunningCommand, spawn_captured};

/// Exit code reported for commands killed at the runner's timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Abstraction over shell execution backends.
///
/// Output returned by [`CommandRunner::await_completion`] is combined
/// stdout/stderr followed by an `exit code: N` marker line; the success
/// check relies on that marker.
pub trait CommandRunner {
    type Handle;

    /// Start `command`. An error means the command could not be started.
    fn execute(&self, command: &str) -> Result<Self::Handle>;

    /// Block until the started command finishes and return its output.
    fn await_completion(&self, handle: Self::Handle) -> Result<String>;
}

/// Runs commands through `sh -c` with a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ShellCommandRunner {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }
}

impl CommandRunner for ShellCommandRunner {
    type Handle = RunningCommand;

    #[instrument(skip_all, fields(command = %command))]
    fn execute(&self, command: &str) -> Result<RunningCommand> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        let running = spawn_captured(cmd, self.output_limit_bytes)
            .with_context(|| format!("start `{command}`"))?;
        info!(pid = running.id(), "command started");
        Ok(running)
    }

    fn await_completion(&self, handle: RunningCommand) -> Result<String> {
        let output = handle.wait(self.timeout).context("await command")?;
        Ok(render_output(&output, self.timeout))
    }
}

/// Combine captured streams into the text form consumed by the success check.
fn render_output(output: &CommandOutput, timeout: Duration) -> String {
    let mut buf = String::new();
    push_stream(&mut buf, &output.stdout, output.stdout_truncated, "stdout");
    push_stream(&mut buf, &output.stderr, output.stderr_truncated, "stderr");

    let code = if output.timed_out {
        buf.push_str(&format!("[timed out after {}s]\n", timeout.as_secs()));
        TIMEOUT_EXIT_CODE
    } else if let Some(code) = output.code() {
        code
    } else {
        buf.push_str("[terminated by signal]\n");
        1
    };
    debug!(code, "rendered command output");
    buf.push_str(&format!("exit code: {code}"));
    buf
}

fn push_stream(buf: &mut String, bytes: &[u8], truncated: usize, label: &str) {
    if bytes.is_empty() {
        return;
    }
    buf.push_str(&String::from_utf8_lossy(bytes));
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    if truncated > 0 {
        buf.push_str(&format!("[{label} truncated {truncated} bytes]\n"));
    }
}
