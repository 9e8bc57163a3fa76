//! Process-lifetime session record: conversation, executions, goals, context,
//! agent states and the environment the session runs in.
//!
//! The orchestrator is the single writer. Logs are append-only; only
//! [`SessionState::clear`] and [`SessionState::import`] replace them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::agents::AgentState;
use crate::core::feedback::truncate_bytes;

/// Execution results longer than this are cut when recorded.
pub const DEFAULT_RESULT_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub action: String,
    pub result: String,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: u64,
    pub text: String,
    pub priority: u8,
    pub status: GoalStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Full exportable session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub conversation: Vec<ConversationTurn>,
    pub executions: Vec<ExecutionRecord>,
    pub goals: Vec<Goal>,
    pub context: BTreeMap<String, Value>,
    /// Last reported state per agent role.
    #[serde(default)]
    pub agent_states: BTreeMap<String, AgentState>,
    #[serde(default)]
    pub environment: BTreeMap<String, Value>,
}

/// Counters reported by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub uptime_secs: i64,
    pub conversation_turns: usize,
    pub executions: usize,
    pub active_goals: usize,
    pub context_keys: Vec<String>,
    pub agent_states: BTreeMap<String, AgentState>,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: String,
    started_at: DateTime<Utc>,
    result_bytes: usize,
    conversation: Vec<ConversationTurn>,
    executions: Vec<ExecutionRecord>,
    goals: Vec<Goal>,
    context: BTreeMap<String, Value>,
    agent_states: BTreeMap<String, AgentState>,
    environment: BTreeMap<String, Value>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_BYTES)
    }
}

impl SessionState {
    pub fn new(result_bytes: usize) -> Self {
        let session_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        info!(session_id = %session_id, "session started");
        Self {
            session_id,
            started_at: Utc::now(),
            result_bytes,
            conversation: Vec::new(),
            executions: Vec::new(),
            goals: Vec::new(),
            context: BTreeMap::new(),
            agent_states: BTreeMap::new(),
            environment: BTreeMap::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn add_turn(&mut self, role: Role, content: impl Into<String>) {
        self.add_turn_with(role, content, BTreeMap::new());
    }

    pub fn add_turn_with(
        &mut self,
        role: Role,
        content: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) {
        debug!(?role, "conversation turn");
        self.conversation.push(ConversationTurn {
            timestamp: Utc::now(),
            role,
            content: content.into(),
            metadata,
        });
    }

    pub fn add_execution(
        &mut self,
        agent_name: &str,
        action: &str,
        result: &str,
        success: bool,
    ) {
        debug!(agent = agent_name, action, success, "execution recorded");
        self.executions.push(ExecutionRecord {
            timestamp: Utc::now(),
            agent_name: agent_name.to_string(),
            action: action.to_string(),
            result: truncate_bytes(result, self.result_bytes).to_string(),
            success,
        });
    }

    /// Track a new active goal and return its id.
    pub fn add_goal(&mut self, text: impl Into<String>, priority: u8) -> u64 {
        self.add_goal_with(text, priority, BTreeMap::new())
    }

    pub fn add_goal_with(
        &mut self,
        text: impl Into<String>,
        priority: u8,
        metadata: BTreeMap<String, String>,
    ) -> u64 {
        let id = self.goals.last().map_or(1, |goal| goal.id + 1);
        let text = text.into();
        info!(goal_id = id, "goal added");
        self.goals.push(Goal {
            id,
            text,
            priority,
            status: GoalStatus::Active,
            created_at: Utc::now(),
            completed_at: None,
            metadata,
        });
        id
    }

    /// Move a goal to `Completed`. Returns false for unknown or already
    /// completed goals; completion is one-way.
    pub fn complete_goal(&mut self, id: u64) -> bool {
        match self.goals.iter_mut().find(|goal| goal.id == id) {
            Some(goal) if goal.status == GoalStatus::Active => {
                goal.status = GoalStatus::Completed;
                goal.completed_at = Some(Utc::now());
                info!(goal_id = id, "goal completed");
                true
            }
            _ => false,
        }
    }

    pub fn active_goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals
            .iter()
            .filter(|goal| goal.status == GoalStatus::Active)
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn conversation(&self) -> &[ConversationTurn] {
        &self.conversation
    }

    pub fn executions(&self) -> &[ExecutionRecord] {
        &self.executions
    }

    pub fn recent_conversation(&self, n: usize) -> &[ConversationTurn] {
        &self.conversation[self.conversation.len().saturating_sub(n)..]
    }

    pub fn recent_executions(&self, n: usize) -> &[ExecutionRecord] {
        &self.executions[self.executions.len().saturating_sub(n)..]
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    pub fn context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn context_values(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    pub fn set_agent_state(&mut self, agent: &str, state: AgentState) {
        debug!(agent, %state, "agent state");
        self.agent_states.insert(agent.to_string(), state);
    }

    pub fn agent_state(&self, agent: &str) -> Option<AgentState> {
        self.agent_states.get(agent).copied()
    }

    pub fn agent_states(&self) -> &BTreeMap<String, AgentState> {
        &self.agent_states
    }

    /// Record a fact about the machine the session runs on (OS, cwd, ...).
    pub fn set_environment(&mut self, key: impl Into<String>, value: Value) {
        self.environment.insert(key.into(), value);
    }

    pub fn environment(&self, key: &str) -> Option<&Value> {
        self.environment.get(key)
    }

    pub fn environment_state(&self) -> &BTreeMap<String, Value> {
        &self.environment
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            conversation_turns: self.conversation.len(),
            executions: self.executions.len(),
            active_goals: self.active_goals().count(),
            context_keys: self.context.keys().cloned().collect(),
            agent_states: self.agent_states.clone(),
        }
    }

    pub fn export(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            conversation: self.conversation.clone(),
            executions: self.executions.clone(),
            goals: self.goals.clone(),
            context: self.context.clone(),
            agent_states: self.agent_states.clone(),
            environment: self.environment.clone(),
        }
    }

    /// Replace every log with the snapshot contents.
    pub fn import(&mut self, snapshot: SessionSnapshot) {
        self.session_id = snapshot.session_id;
        self.started_at = snapshot.started_at;
        self.conversation = snapshot.conversation;
        self.executions = snapshot.executions;
        self.goals = snapshot.goals;
        self.context = snapshot.context;
        self.agent_states = snapshot.agent_states;
        self.environment = snapshot.environment;
        info!(session_id = %self.session_id, "session imported");
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
        self.executions.clear();
        self.goals.clear();
        self.context.clear();
        self.agent_states.clear();
        info!(session_id = %self.session_id, "session cleared");
    }
}
