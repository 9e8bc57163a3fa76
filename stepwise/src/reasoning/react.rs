//! Bounded think → act → observe loop.
//!
//! Each iteration produces a thought, stops if the thought declares the goal
//! achieved, otherwise picks an action, dispatches it through the caller's
//! [`ActionRegistry`], and folds the observation back into the context.
//! `max_iterations` is a hard bound.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::types::ReActStep;
use crate::io::model::{LanguageModel, Message};
use crate::io::prompt::{PromptEngine, ThinkPrompt};
use crate::reasoning::registry::ActionRegistry;

/// A thought containing any of these (case-insensitive) ends the loop.
pub const COMPLETION_WORDS: &[&str] = &["completed", "finished", "done", "achieved", "success"];

/// Action chosen when no reasoner overrides the decision.
pub const DEFAULT_ACTION: &str = "execute_command";

pub fn goal_achieved(thought: &str) -> bool {
    let lower = thought.to_lowercase();
    COMPLETION_WORDS.iter().any(|word| lower.contains(word))
}

/// Context threaded through one loop run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReactContext {
    /// Caller-supplied values.
    pub values: BTreeMap<String, Value>,
    pub last_observation: Option<String>,
    /// Last completed iteration (1-based); 0 before the first observation.
    pub iteration: u32,
}

impl ReactContext {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }
}

/// Source of thoughts and action decisions.
///
/// The default methods are the built-in templates.
pub trait Reasoner {
    fn think(&mut self, goal: &str, context: &ReactContext, _trace: &[ReActStep]) -> Result<String> {
        Ok(default_thought(goal, context))
    }

    fn decide(
        &mut self,
        _goal: &str,
        _thought: &str,
        _context: &ReactContext,
        _actions: &[String],
    ) -> Result<String> {
        Ok(DEFAULT_ACTION.to_string())
    }
}

pub fn default_thought(goal: &str, context: &ReactContext) -> String {
    match context.last_observation.as_deref() {
        Some(observation) if !observation.is_empty() => {
            format!("Based on observation '{observation}', I need to continue toward: {goal}")
        }
        _ => format!("I need to achieve: {goal}. Let me start by analyzing the situation."),
    }
}

/// Reasoner that only uses the built-in templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReasoner;

impl Reasoner for DefaultReasoner {}

/// Reasoner backed by a language model.
pub struct ModelReasoner<M> {
    model: M,
    prompts: PromptEngine,
}

impl<M: LanguageModel> ModelReasoner<M> {
    pub fn new(model: M) -> Result<Self> {
        Ok(Self {
            model,
            prompts: PromptEngine::new()?,
        })
    }
}

impl<M: LanguageModel> Reasoner for ModelReasoner<M> {
    fn think(&mut self, goal: &str, context: &ReactContext, trace: &[ReActStep]) -> Result<String> {
        let prompt = self.prompts.render_think(&ThinkPrompt {
            goal,
            iteration: context.iteration,
            trace: trace.iter().map(ToString::to_string).collect(),
            last_observation: context.last_observation.as_deref(),
        })?;
        let reply = self
            .model
            .complete(&[Message::user(prompt)])
            .context("request thought from model")?;
        Ok(reply.trim().to_string())
    }

    fn decide(
        &mut self,
        goal: &str,
        thought: &str,
        _context: &ReactContext,
        actions: &[String],
    ) -> Result<String> {
        let prompt = self.prompts.render_act(goal, thought, actions)?;
        let reply = self
            .model
            .complete(&[Message::user(prompt)])
            .context("request action from model")?;
        let line = reply
            .lines()
            .map(|line| line.trim().trim_matches('`').trim())
            .find(|line| !line.is_empty())
            .unwrap_or(DEFAULT_ACTION);
        Ok(line.to_string())
    }
}

/// Result of one loop run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactOutcome {
    /// True only when a thought matched the completion predicate.
    pub success: bool,
    pub iterations: u32,
    pub trace: Vec<ReActStep>,
    pub final_context: ReactContext,
}

#[derive(Debug, Clone)]
pub struct ReasoningLoop {
    max_iterations: u32,
    trace: Vec<ReActStep>,
}

impl ReasoningLoop {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            trace: Vec::new(),
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn trace(&self) -> &[ReActStep] {
        &self.trace
    }

    /// Run the loop for `goal`. The trace from any previous run is discarded.
    #[instrument(skip_all, fields(max_iterations = self.max_iterations))]
    pub fn run(
        &mut self,
        goal: &str,
        values: BTreeMap<String, Value>,
        reasoner: &mut dyn Reasoner,
        registry: &mut ActionRegistry<'_>,
    ) -> Result<ReactOutcome> {
        self.trace.clear();
        let mut context = ReactContext::new(values);
        let actions = registry.names();
        let mut success = false;
        let mut iteration = 0;

        while iteration < self.max_iterations {
            iteration += 1;

            let thought = reasoner
                .think(goal, &context, &self.trace)
                .with_context(|| format!("think at iteration {iteration}"))?;
            self.push(ReActStep::Thought(thought.clone()));
            if goal_achieved(&thought) {
                success = true;
                info!(iteration, "goal achieved");
                break;
            }

            let action = reasoner
                .decide(goal, &thought, &context, &actions)
                .with_context(|| format!("decide at iteration {iteration}"))?;
            self.push(ReActStep::Action(action.clone()));

            let observation = match registry.dispatch(&action, &context) {
                Ok((name, result)) => format!("Action '{name}' completed: {result}"),
                Err(err) => err.to_string(),
            };
            self.push(ReActStep::Observation(observation.clone()));

            context.last_observation = Some(observation);
            context.iteration = iteration;
        }

        if !success {
            info!(iterations = iteration, "iteration bound reached");
        }
        Ok(ReactOutcome {
            success,
            iterations: iteration,
            trace: self.trace.clone(),
            final_context: context,
        })
    }

    fn push(&mut self, step: ReActStep) {
        debug!(%step, "react step");
        self.trace.push(step);
    }

    /// Numbered rendering of the last run's trace.
    pub fn format_trace(&self) -> String {
        format_trace(&self.trace)
    }

    pub fn clear(&mut self) {
        self.trace.clear();
    }
}

pub fn format_trace(trace: &[ReActStep]) -> String {
    if trace.is_empty() {
        return "No trace available.".to_string();
    }
    let mut out = String::from("ReAct Trace:");
    for (index, step) in trace.iter().enumerate() {
        out.push_str(&format!("\n{}. {step}", index + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::test_support::ScriptedModel;

    /// Reasoner that replays fixed thoughts and actions.
    struct Script {
        thoughts: VecDeque<&'static str>,
        actions: VecDeque<&'static str>,
    }

    impl Reasoner for Script {
        fn think(&mut self, goal: &str, ctx: &ReactContext, _: &[ReActStep]) -> Result<String> {
            Ok(self
                .thoughts
                .pop_front()
                .map(str::to_string)
                .unwrap_or_else(|| default_thought(goal, ctx)))
        }

        fn decide(&mut self, _: &str, _: &str, _: &ReactContext, _: &[String]) -> Result<String> {
            Ok(self.actions.pop_front().unwrap_or(DEFAULT_ACTION).to_string())
        }
    }

    #[test]
    fn exhaustion_reports_failure_with_full_trace() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("execute_command", |_, _| Ok("nothing happened".to_string()));
        // Default thoughts echo the observation, so keep it free of completion words.
        let mut engine = ReasoningLoop::new(3);
        let mut script = Script {
            thoughts: VecDeque::from(["look around", "keep going", "still going"]),
            actions: VecDeque::new(),
        };
        let outcome = engine
            .run("tidy logs", BTreeMap::new(), &mut script, &mut registry)
            .expect("run");
        assert!(!outcome.success);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.trace.len(), 9);
        assert_eq!(outcome.final_context.iteration, 3);
    }

    #[test]
    fn completion_word_stops_immediately() {
        let mut registry = ActionRegistry::new();
        let mut engine = ReasoningLoop::new(10);
        let mut script = Script {
            thoughts: VecDeque::from(["step one", "All DONE here"]),
            actions: VecDeque::from(["get_info"]),
        };
        let outcome = engine
            .run("x", BTreeMap::new(), &mut script, &mut registry)
            .expect("run");
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(
            outcome.trace,
            vec![
                ReActStep::Thought("step one".to_string()),
                ReActStep::Action("get_info".to_string()),
                ReActStep::Observation("Unknown action: get_info".to_string()),
                ReActStep::Thought("All DONE here".to_string()),
            ]
        );
    }

    #[test]
    fn success_on_last_iteration_still_counts() {
        let mut registry = ActionRegistry::new();
        let mut engine = ReasoningLoop::new(2);
        let mut script = Script {
            thoughts: VecDeque::from(["hmm", "finished"]),
            actions: VecDeque::new(),
        };
        let outcome = engine
            .run("x", BTreeMap::new(), &mut script, &mut registry)
            .expect("run");
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 2);
    }

    #[test]
    fn observations_fold_into_context() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("echo", |params, ctx| {
            Ok(format!("{params} after {}", ctx.iteration))
        });
        let mut engine = ReasoningLoop::new(1);
        let mut script = Script {
            thoughts: VecDeque::from(["go"]),
            actions: VecDeque::from(["echo: hi"]),
        };
        let outcome = engine
            .run("x", BTreeMap::new(), &mut script, &mut registry)
            .expect("run");
        assert_eq!(
            outcome.final_context.last_observation.as_deref(),
            Some("Action 'echo' completed: hi after 0")
        );
    }

    #[test]
    fn default_reasoner_starts_with_analysis_template() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("execute_command", |_, _| anyhow::bail!("no command provided"));
        let mut engine = ReasoningLoop::new(2);
        let outcome = engine
            .run("list files", BTreeMap::new(), &mut DefaultReasoner, &mut registry)
            .expect("run");
        assert_eq!(
            outcome.trace[0],
            ReActStep::Thought(
                "I need to achieve: list files. Let me start by analyzing the situation."
                    .to_string()
            )
        );
        assert_eq!(
            outcome.trace[2],
            ReActStep::Observation(
                "Action 'execute_command' failed: no command provided".to_string()
            )
        );
        assert!(!outcome.success);
    }

    #[test]
    fn new_run_clears_previous_trace() {
        let mut registry = ActionRegistry::new();
        let mut engine = ReasoningLoop::new(1);
        engine
            .run("a", BTreeMap::new(), &mut DefaultReasoner, &mut registry)
            .expect("run");
        let first = engine.trace().len();
        engine
            .run("b", BTreeMap::new(), &mut DefaultReasoner, &mut registry)
            .expect("run");
        assert_eq!(engine.trace().len(), first);
        assert!(engine.format_trace().starts_with("ReAct Trace:\n1. Thought: I need to achieve: b."));
        engine.clear();
        assert_eq!(engine.format_trace(), "No trace available.");
    }

    #[test]
    fn model_reasoner_uses_first_reply_line_as_action() {
        let model = ScriptedModel::new(vec![
            "I should look at the files",
            "`execute_command: ls`\nbecause listing helps",
            "Listing completed",
        ]);
        let mut reasoner = ModelReasoner::new(&model).expect("reasoner");
        let mut registry = ActionRegistry::new();
        registry.register_fn("execute_command", |params, _| Ok(format!("ran {params}")));
        let mut engine = ReasoningLoop::new(5);
        let outcome = engine
            .run("list files", BTreeMap::new(), &mut reasoner, &mut registry)
            .expect("run");
        assert!(outcome.success);
        assert_eq!(outcome.trace[1], ReActStep::Action("execute_command: ls".to_string()));
        assert_eq!(
            outcome.trace[2],
            ReActStep::Observation("Action 'execute_command' completed: ran ls".to_string())
        );
        assert_eq!(model.requests().len(), 3);
    }

    #[test]
    fn model_failure_is_an_error() {
        let model = ScriptedModel::new(vec![]);
        let mut reasoner = ModelReasoner::new(&model).expect("reasoner");
        let mut engine = ReasoningLoop::new(5);
        let err = engine
            .run("x", BTreeMap::new(), &mut reasoner, &mut ActionRegistry::new())
            .unwrap_err();
        assert!(format!("{err:#}").contains("think at iteration 1"));
    }
}
