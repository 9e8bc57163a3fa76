//! Linear chain-of-thought trace produced once per goal.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::core::types::ThoughtStep;

/// Fixed reasoning template: `(thought, reasoning)` pairs. `{problem}` is
/// substituted into the first reasoning line.
const TEMPLATE: &[(&str, &str)] = &[
    ("Understand the goal", "Analyzing: {problem}"),
    ("Identify required information", "Determining what we need to know"),
    ("Plan approach", "Deciding on the best strategy"),
    ("Consider constraints", "Checking safety and feasibility"),
    ("Generate solution", "Creating the solution based on reasoning"),
];

#[derive(Debug, Clone, Default)]
pub struct ChainOfThought {
    chain: Vec<ThoughtStep>,
}

impl ChainOfThought {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current chain with a fresh one for `problem`.
    ///
    /// The chain is never empty afterwards and is numbered from 1.
    pub fn think(&mut self, problem: &str, _context: &BTreeMap<String, Value>) -> &[ThoughtStep] {
        info!(steps = TEMPLATE.len(), "chain of thought started");
        self.chain = TEMPLATE
            .iter()
            .zip(1..)
            .map(|((thought, reasoning), number)| {
                ThoughtStep::new(number, *thought, reasoning.replace("{problem}", problem))
            })
            .collect();
        &self.chain
    }

    pub fn steps(&self) -> &[ThoughtStep] {
        &self.chain
    }

    /// Thought of the final step, if any.
    pub fn conclusion(&self) -> Option<&str> {
        self.chain.last().map(|step| step.thought.as_str())
    }

    pub fn add_step(&mut self, thought: impl Into<String>, reasoning: impl Into<String>) {
        let step = ThoughtStep::new(self.chain.len() as u32 + 1, thought, reasoning);
        debug!(%step, "thought added");
        self.chain.push(step);
    }

    pub fn clear(&mut self) {
        self.chain.clear();
    }

    pub fn format_for_display(&self, show_reasoning: bool) -> String {
        if self.chain.is_empty() {
            return "No reasoning chain available.".to_string();
        }
        let mut out = String::from("Chain of Thought:");
        for step in &self.chain {
            out.push_str(&format!("\n  {}. {}", step.step_number, step.thought));
            if show_reasoning && !step.reasoning.is_empty() {
                out.push_str(&format!("\n     → {}", step.reasoning));
            }
        }
        out
    }
}
