//! Human approval checkpoint in front of every side-effecting command.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// One blocking question to a human operator.
pub trait Prompter {
    /// Show `command` (and any safety `notice`) and read one answer line.
    ///
    /// `Ok(None)` means the input stream closed before an answer arrived.
    fn ask(&mut self, command: &str, notice: Option<&str>) -> Result<Option<String>>;
}

/// Line-oriented prompter over any reader/writer pair (stdin/stderr in the CLI).
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn ask(&mut self, command: &str, notice: Option<&str>) -> Result<Option<String>> {
        if let Some(notice) = notice {
            writeln!(self.output, "WARNING: {notice}").context("write approval notice")?;
        }
        writeln!(self.output, "Command: {command}").context("write approval prompt")?;
        write!(self.output, "Execute this command? [Y/n] ").context("write approval prompt")?;
        self.output.flush().context("flush approval prompt")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("read approval answer")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Only these answers deny (trimmed, case-insensitive).
pub fn is_negative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no")
}

/// Approval policy plus the prompter used when a human must decide.
pub struct ApprovalGate<P> {
    pub require_approval: bool,
    pub auto_approve: bool,
    prompter: P,
}

impl<P: Prompter> ApprovalGate<P> {
    pub fn new(require_approval: bool, auto_approve: bool, prompter: P) -> Self {
        Self {
            require_approval,
            auto_approve,
            prompter,
        }
    }

    /// True when `request` will return without asking anyone.
    pub fn bypassed(&self) -> bool {
        !self.require_approval || self.auto_approve
    }

    /// Decide whether `command` may run.
    ///
    /// Closed input and read failures deny; any answer other than `n`/`no`
    /// approves.
    pub fn request(&mut self, command: &str, notice: Option<&str>) -> bool {
        if self.bypassed() {
            debug!("approval bypassed by configuration");
            return true;
        }

        match self.prompter.ask(command, notice) {
            Ok(Some(answer)) => {
                let approved = !is_negative(&answer);
                info!(approved, "approval answered");
                approved
            }
            Ok(None) => {
                warn!("approval input closed, denying");
                false
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "approval prompt failed, denying");
                false
            }
        }
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }
}
