//! Scripted fakes for the runner, prompter, and model seams.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::io::approval::Prompter;
use crate::io::model::{LanguageModel, Message};
use crate::io::shell::CommandRunner;

/// One scripted raw-execution result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedRun {
    /// Command starts and completes with this output.
    Output(String),
    /// Command fails to start.
    StartFailure(String),
    /// Command starts but waiting for it fails.
    WaitFailure(String),
}

impl ScriptedRun {
    pub fn ok(output: &str) -> Self {
        ScriptedRun::Output(format!("{output}\nexit code: 0"))
    }

    pub fn exit(output: &str, code: i32) -> Self {
        ScriptedRun::Output(format!("{output}\nexit code: {code}"))
    }
}

/// Runner that replays scripted results in order and records every command.
///
/// Once the script is exhausted, every further command succeeds with empty
/// output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: RefCell<VecDeque<ScriptedRun>>,
    started: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new(script: Vec<ScriptedRun>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            started: RefCell::new(Vec::new()),
        }
    }

    /// Commands passed to `execute`, including ones that failed to start.
    pub fn started(&self) -> Vec<String> {
        self.started.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    type Handle = ScriptedRun;

    fn execute(&self, command: &str) -> Result<ScriptedRun> {
        self.started.borrow_mut().push(command.to_string());
        let next = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| ScriptedRun::ok(""));
        match next {
            ScriptedRun::StartFailure(message) => Err(anyhow!(message)),
            other => Ok(other),
        }
    }

    fn await_completion(&self, handle: ScriptedRun) -> Result<String> {
        match handle {
            ScriptedRun::Output(output) => Ok(output),
            ScriptedRun::WaitFailure(message) | ScriptedRun::StartFailure(message) => {
                Err(anyhow!(message))
            }
        }
    }
}

/// Prompter that replays scripted answers and records each question.
///
/// `None` answers simulate a closed input stream. An exhausted script also
/// behaves like closed input.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Option<String>>,
    asked: Vec<(String, Option<String>)>,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<Option<&str>>) -> Self {
        Self {
            answers: answers
                .into_iter()
                .map(|answer| answer.map(str::to_string))
                .collect(),
            asked: Vec::new(),
        }
    }

    /// Prompter that approves `n` questions with `y`.
    pub fn approving(n: usize) -> Self {
        Self::new(vec![Some("y"); n])
    }

    /// `(command, notice)` pairs in the order they were asked.
    pub fn asked(&self) -> &[(String, Option<String>)] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, command: &str, notice: Option<&str>) -> Result<Option<String>> {
        self.asked
            .push((command.to_string(), notice.map(str::to_string)));
        Ok(self.answers.pop_front().flatten())
    }
}

/// Model that replays scripted completions and records every request.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: RefCell::new(responses.into_iter().map(str::to_string).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.borrow().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        self.requests.borrow_mut().push(messages.to_vec());
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model has no more responses"))
    }
}
