//! Agents: planners that turn goals into plans, and the executor that runs
//! commands behind verification and approval.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod executor;
pub mod planner;

/// Shared keyed context passed to agents.
pub type AgentContext = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Planner,
    Executor,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Planner => "planner",
            AgentRole::Executor => "executor",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an agent is doing right now; recorded in the session after each goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    #[default]
    Idle,
    Thinking,
    Acting,
    /// Blocked on the operator.
    Waiting,
    /// The last task failed.
    Error,
}

impl AgentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Thinking => "thinking",
            AgentState::Acting => "acting",
            AgentState::Waiting => "waiting",
            AgentState::Error => "error",
        }
    }

    /// State after a task finished with `ok`.
    pub fn settled(ok: bool) -> Self {
        if ok { AgentState::Idle } else { AgentState::Error }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common interface for every agent the orchestrator drives.
pub trait Agent {
    type Output;

    fn role(&self) -> AgentRole;

    fn state(&self) -> AgentState;

    /// Handle one task (a goal for planners, a command for executors).
    fn process(&mut self, task: &str, context: &AgentContext) -> Result<Self::Output>;
}
