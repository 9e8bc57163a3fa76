//! Shared deterministic types for the execution-control core.
//!
//! These types define stable contracts between components. They carry no I/O
//! and serialize to stable snake_case JSON so session snapshots stay readable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Complexity tier assigned to a goal by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing strategy picked by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    ChainOfThought,
    Reasoning,
    Planning,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::ChainOfThought => "chain_of_thought",
            Strategy::Reasoning => "reasoning",
            Strategy::Planning => "planning",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a plan step.
///
/// Transitions are driven only by the plan driver:
/// `Pending -> InProgress -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    /// Glyph used in human-readable plan summaries.
    pub fn glyph(self) -> &'static str {
        match self {
            StepStatus::Completed => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Pending | StepStatus::InProgress => "⋯",
        }
    }
}

/// Structured result of one RetryingExecutor invocation.
///
/// A fresh value is produced per call; nothing here is shared.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub executed: bool,
    pub approved: bool,
    /// Set only when the operator refused the command.
    #[serde(default)]
    pub denied: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl CommandOutcome {
    /// Outcome for a command the operator refused.
    pub fn denied() -> Self {
        Self {
            denied: true,
            error: Some("command denied by user".to_string()),
            ..Self::default()
        }
    }

    /// Outcome for a command that never reached the approval step.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Best available text describing the outcome (output, else error).
    pub fn detail(&self) -> &str {
        self.output
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }
}

/// One entry of a ReAct trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum ReActStep {
    Thought(String),
    Action(String),
    Observation(String),
}

impl ReActStep {
    pub fn content(&self) -> &str {
        match self {
            ReActStep::Thought(text) | ReActStep::Action(text) | ReActStep::Observation(text) => {
                text
            }
        }
    }
}

impl fmt::Display for ReActStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReActStep::Thought(text) => write!(f, "Thought: {text}"),
            ReActStep::Action(text) => write!(f, "Action: {text}"),
            ReActStep::Observation(text) => write!(f, "Observation: {text}"),
        }
    }
}

/// One step of a chain-of-thought trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub step_number: u32,
    pub thought: String,
    pub reasoning: String,
    /// Always within `[0, 1]`.
    pub confidence: f32,
}

impl ThoughtStep {
    pub fn new(step_number: u32, thought: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            step_number,
            thought: thought.into(),
            reasoning: reasoning.into(),
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

impl fmt::Display for ThoughtStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {}", self.step_number, self.thought)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_status_serializes_snake_case() {
        let json = serde_json::to_string(&StepStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn outcome_detail_prefers_output() {
        let outcome = CommandOutcome {
            output: Some("out".to_string()),
            error: Some("err".to_string()),
            ..CommandOutcome::default()
        };
        assert_eq!(outcome.detail(), "out");
        assert_eq!(CommandOutcome::denied().detail(), "command denied by user");
    }

    #[test]
    fn thought_confidence_is_clamped() {
        let step = ThoughtStep::new(1, "t", "r").with_confidence(3.0);
        assert_eq!(step.confidence, 1.0);
        assert_eq!(ThoughtStep::new(1, "t", "r").confidence, 1.0);
    }
}
