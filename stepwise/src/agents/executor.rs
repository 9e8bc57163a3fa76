//! Retrying command executor behind verification and approval.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::agents::{Agent, AgentContext, AgentRole, AgentState};
use crate::core::feedback::truncate_bytes;
use crate::core::success::output_indicates_success;
use crate::core::types::CommandOutcome;
use crate::core::verifier::verify;
use crate::io::approval::{ApprovalGate, Prompter};
use crate::io::config::AgentConfig;
use crate::io::shell::CommandRunner;

pub const NO_COMMAND: &str = "no command provided";
pub const MAX_RETRIES_EXCEEDED: &str = "max retries exceeded";

/// One approved command run, as kept in the executor history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub command: String,
    pub output: String,
    pub success: bool,
}

/// Bounded run history. Growing past `cap` keeps only the newest half.
#[derive(Debug, Clone)]
pub struct ExecutionHistory {
    entries: Vec<HistoryEntry>,
    cap: usize,
    output_bytes: usize,
}

impl ExecutionHistory {
    pub fn new(cap: usize, output_bytes: usize) -> Self {
        Self {
            entries: Vec::new(),
            cap,
            output_bytes,
        }
    }

    pub fn record(&mut self, command: &str, output: &str, success: bool) {
        self.entries.push(HistoryEntry {
            command: command.to_string(),
            output: truncate_bytes(output, self.output_bytes).to_string(),
            success,
        });
        if self.entries.len() > self.cap {
            let keep = self.cap / 2;
            let drop = self.entries.len() - keep;
            self.entries.drain(..drop);
            debug!(kept = keep, "execution history compacted");
        }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs one command at a time: verify, ask, then attempt up to a bound.
pub struct RetryingExecutor<R, P> {
    runner: R,
    gate: ApprovalGate<P>,
    max_retries: u32,
    history: ExecutionHistory,
    state: AgentState,
}

impl<R: CommandRunner, P: Prompter> RetryingExecutor<R, P> {
    pub fn new(runner: R, gate: ApprovalGate<P>, max_retries: u32) -> Self {
        Self {
            runner,
            gate,
            max_retries,
            history: ExecutionHistory::new(100, 200),
            state: AgentState::Idle,
        }
    }

    pub fn from_config(runner: R, prompter: P, config: &AgentConfig) -> Self {
        let gate = ApprovalGate::new(config.require_approval, config.auto_approve, prompter);
        Self {
            runner,
            gate,
            max_retries: config.max_retries,
            history: ExecutionHistory::new(config.history.cap, config.history.record_output_bytes),
            state: AgentState::Idle,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub fn gate(&self) -> &ApprovalGate<P> {
        &self.gate
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `command` with the configured retry bound.
    pub fn run_default(&mut self, command: &str) -> CommandOutcome {
        self.run(command, self.max_retries)
    }

    /// Run `command`, attempting it at most `max_retries` times.
    ///
    /// Unsafe commands are still offered for approval with the verifier's
    /// warning. A denial ends the call without any attempt. Each attempt that
    /// completes is classified from its output; the first success or the last
    /// attempt decides the outcome.
    ///
    /// The executor waits while the operator decides and acts while attempts
    /// run. It ends in [`AgentState::Error`] only after an approved command
    /// failed.
    #[instrument(skip_all, fields(command = %command.trim(), max_retries))]
    pub fn run(&mut self, command: &str, max_retries: u32) -> CommandOutcome {
        let outcome = self.run_checked(command, max_retries);
        self.state = AgentState::settled(outcome.success || !outcome.approved);
        outcome
    }

    fn run_checked(&mut self, command: &str, max_retries: u32) -> CommandOutcome {
        let command = command.trim();
        if command.is_empty() {
            warn!("empty command rejected");
            return CommandOutcome::rejected(NO_COMMAND);
        }

        let verdict = verify(command);
        if !verdict.is_safe {
            warn!(reason = %verdict.reason, "command flagged as unsafe");
        } else if verdict.caution {
            warn!(reason = %verdict.reason, "command needs caution");
        }

        self.state = AgentState::Waiting;
        if !self.gate.request(command, verdict.notice()) {
            info!("command denied");
            return CommandOutcome::denied();
        }
        self.state = AgentState::Acting;

        let mut last_error = None;
        for attempt in 1..=max_retries {
            let handle = match self.runner.execute(command) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(attempt, err = %format!("{err:#}"), "command failed to start");
                    last_error = Some(format!("{err:#}"));
                    continue;
                }
            };

            let output = match self.runner.await_completion(handle) {
                Ok(output) => output,
                Err(err) => {
                    warn!(attempt, err = %format!("{err:#}"), "command did not complete");
                    last_error = Some(format!("{err:#}"));
                    continue;
                }
            };

            let success = output_indicates_success(&output);
            if success || attempt == max_retries {
                self.history.record(command, &output, success);
                info!(attempt, success, "command finished");
                return CommandOutcome {
                    success,
                    executed: true,
                    approved: true,
                    denied: false,
                    output: Some(output),
                    error: None,
                    attempts: attempt,
                };
            }
            last_error = None;
            debug!(attempt, "attempt failed, retrying");
        }

        CommandOutcome {
            success: false,
            executed: false,
            approved: true,
            denied: false,
            output: None,
            error: Some(last_error.unwrap_or_else(|| MAX_RETRIES_EXCEEDED.to_string())),
            attempts: max_retries,
        }
    }
}

impl<R: CommandRunner, P: Prompter> Agent for RetryingExecutor<R, P> {
    type Output = CommandOutcome;

    fn role(&self) -> AgentRole {
        AgentRole::Executor
    }

    fn state(&self) -> AgentState {
        self.state
    }

    fn process(&mut self, task: &str, _context: &AgentContext) -> Result<CommandOutcome> {
        Ok(self.run_default(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedPrompter, ScriptedRun, ScriptedRunner};

    fn executor(
        script: Vec<ScriptedRun>,
        prompter: ScriptedPrompter,
    ) -> RetryingExecutor<ScriptedRunner, ScriptedPrompter> {
        RetryingExecutor::new(
            ScriptedRunner::new(script),
            ApprovalGate::new(true, false, prompter),
            3,
        )
    }

    #[test]
    fn fail_fail_succeed_takes_three_attempts() {
        let mut exec = executor(
            vec![
                ScriptedRun::exit("boom", 1),
                ScriptedRun::exit("boom", 1),
                ScriptedRun::ok("fine"),
            ],
            ScriptedPrompter::approving(1),
        );
        let outcome = exec.run("make", 3);
        assert!(outcome.success);
        assert!(outcome.executed && outcome.approved);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(exec.runner().started().len(), 3);
        // Only the deciding attempt is recorded.
        assert_eq!(exec.history().len(), 1);
        assert_eq!(exec.state(), AgentState::Idle);
    }

    #[test]
    fn single_attempt_failure_is_returned() {
        let mut exec = executor(
            vec![ScriptedRun::Output("ls: cannot access 'x'".to_string())],
            ScriptedPrompter::approving(1),
        );
        let outcome = exec.run("ls x", 1);
        assert!(!outcome.success);
        assert!(outcome.executed);
        assert_eq!(outcome.attempts, 1);
        assert!(!exec.history().entries()[0].success);
        assert_eq!(exec.state(), AgentState::Error);
    }

    #[test]
    fn denial_stops_without_attempts() {
        let mut exec = executor(vec![], ScriptedPrompter::new(vec![Some("no")]));
        let outcome = exec.run("ls", 3);
        assert_eq!(outcome, CommandOutcome::denied());
        assert!(outcome.denied);
        assert!(exec.runner().started().is_empty());
        assert!(exec.history().is_empty());
        assert_eq!(exec.state(), AgentState::Idle);
    }

    #[test]
    fn empty_command_never_prompts() {
        let mut exec = executor(vec![], ScriptedPrompter::approving(1));
        let outcome = exec.run("   ", 3);
        assert_eq!(outcome.error.as_deref(), Some(NO_COMMAND));
        assert_eq!(outcome.attempts, 0);
        assert!(exec.gate().prompter().asked().is_empty());
    }

    #[test]
    fn unsafe_command_is_still_offered_with_warning() {
        let mut exec = executor(vec![], ScriptedPrompter::new(vec![Some("n")]));
        let outcome = exec.run("rm -rf /", 3);
        assert!(!outcome.approved);
        let asked = exec.gate().prompter().asked();
        assert_eq!(asked.len(), 1);
        assert!(asked[0].1.as_deref().is_some_and(|n| n.contains("dangerous")));
    }

    #[test]
    fn bypassed_gate_does_not_prompt() {
        let mut exec = RetryingExecutor::new(
            ScriptedRunner::new(vec![ScriptedRun::ok("hi")]),
            ApprovalGate::new(false, false, ScriptedPrompter::default()),
            3,
        );
        assert!(exec.run("echo hi", 3).success);
        assert!(exec.gate().prompter().asked().is_empty());
    }

    #[test]
    fn start_failures_retry_then_surface_last_error() {
        let mut exec = executor(
            vec![
                ScriptedRun::StartFailure("no shell".to_string()),
                ScriptedRun::WaitFailure("lost child".to_string()),
            ],
            ScriptedPrompter::approving(1),
        );
        let outcome = exec.run("ls", 2);
        assert!(outcome.approved);
        assert!(!outcome.executed);
        assert_eq!(outcome.error.as_deref(), Some("lost child"));
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn permission_denied_start_error_is_not_a_denial() {
        let mut exec = executor(
            vec![ScriptedRun::StartFailure("permission denied".to_string())],
            ScriptedPrompter::approving(1),
        );
        let outcome = exec.run("./deploy.sh", 1);
        assert!(outcome.approved);
        assert!(!outcome.denied);
        assert_eq!(outcome.error.as_deref(), Some("permission denied"));
    }

    #[test]
    fn start_failure_then_success_counts_attempts() {
        let mut exec = executor(
            vec![
                ScriptedRun::StartFailure("busy".to_string()),
                ScriptedRun::ok("done"),
            ],
            ScriptedPrompter::approving(1),
        );
        let outcome = exec.run("ls", 3);
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn legitimate_cannot_output_is_misclassified_without_exit_marker() {
        let mut exec = executor(
            vec![
                ScriptedRun::Output("tip: you cannot undo this".to_string()),
                ScriptedRun::Output("tip: you cannot undo this".to_string()),
            ],
            ScriptedPrompter::approving(1),
        );
        let outcome = exec.run("cat tips.txt", 2);
        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn history_compacts_to_newest_half() {
        let mut history = ExecutionHistory::new(4, 3);
        for i in 0..5 {
            history.record(&format!("cmd{i}"), "abcdef", true);
        }
        let commands: Vec<_> = history.entries().iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["cmd3", "cmd4"]);
        assert_eq!(history.entries()[0].output, "abc");
    }
}
