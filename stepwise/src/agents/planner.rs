//! Planner agents: goal in, validated [`ExecutionPlan`] out.

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::agents::{Agent, AgentContext, AgentRole, AgentState};
use crate::core::plan::ExecutionPlan;
use crate::core::tags::{TERMINAL, tag_bodies};
use crate::core::types::Complexity;
use crate::io::model::{LanguageModel, Message};
use crate::io::prompt::PromptEngine;

/// Keyword-driven decomposition into a linear chain of symbolic actions.
///
/// - `install` ⇒ system info, search, install, verify.
/// - `file` + `create` ⇒ check path, create, verify.
/// - `analyze` or `check` ⇒ gather, analyze, report.
/// - anything else ⇒ a generic four-step chain.
pub fn template_steps(goal: &str) -> &'static [(&'static str, &'static str)] {
    let lower = goal.to_lowercase();
    if lower.contains("install") {
        &[
            ("verify_system_info", "Check OS and package manager"),
            ("search_package", "Find the package"),
            ("install_package", "Install the package"),
            ("verify_installation", "Verify installation"),
        ]
    } else if lower.contains("file") && lower.contains("create") {
        &[
            ("check_path", "Verify target path exists"),
            ("create_file", "Create the file"),
            ("verify_file", "Verify file creation"),
        ]
    } else if lower.contains("analyze") || lower.contains("check") {
        &[
            ("gather_info", "Collect system information"),
            ("analyze_data", "Analyze the data"),
            ("generate_report", "Create report"),
        ]
    } else {
        &[
            ("analyze_request", "Understand the request"),
            ("gather_context", "Collect necessary information"),
            ("execute_action", "Perform the action"),
            ("verify_result", "Verify the outcome"),
        ]
    }
}

/// Rough size tier of a plan: up to 3 steps low, up to 6 medium.
pub fn estimate_plan_complexity(plan: &ExecutionPlan) -> Complexity {
    match plan.steps().len() {
        0..=3 => Complexity::Low,
        4..=6 => Complexity::Medium,
        _ => Complexity::High,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePlanner {
    state: AgentState,
}

impl TemplatePlanner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Agent for TemplatePlanner {
    type Output = ExecutionPlan;

    fn role(&self) -> AgentRole {
        AgentRole::Planner
    }

    fn state(&self) -> AgentState {
        self.state
    }

    #[instrument(skip_all, fields(goal = %goal))]
    fn process(&mut self, goal: &str, _context: &AgentContext) -> Result<ExecutionPlan> {
        self.state = AgentState::Thinking;
        let plan = ExecutionPlan::linear(goal, template_steps(goal).iter().copied())
            .context("build template plan");
        self.state = AgentState::settled(plan.is_ok());
        let plan = plan?;
        debug!(steps = plan.steps().len(), "template plan built");
        Ok(plan)
    }
}

/// Asks the model for `<mcp:terminal>` commands and chains them in order.
pub struct ModelPlanner<M> {
    model: M,
    prompts: PromptEngine,
    max_steps: usize,
    state: AgentState,
}

impl<M: LanguageModel> ModelPlanner<M> {
    pub fn new(model: M, max_steps: usize) -> Result<Self> {
        Ok(Self {
            model,
            prompts: PromptEngine::new()?,
            max_steps,
            state: AgentState::Idle,
        })
    }

    fn plan(&self, goal: &str, context: &AgentContext) -> Result<ExecutionPlan> {
        let messages = [
            Message::system(self.prompts.render_system("")?),
            Message::user(self.prompts.render_plan(goal, context)?),
        ];
        let reply = self.model.complete(&messages).context("request plan from model")?;

        let mut commands: Vec<String> = tag_bodies(&reply, TERMINAL)
            .into_iter()
            .filter(|command| !command.is_empty())
            .collect();
        if commands.is_empty() {
            bail!("model proposed no commands for goal");
        }
        if commands.len() > self.max_steps {
            warn!(
                proposed = commands.len(),
                max_steps = self.max_steps,
                "plan truncated"
            );
            commands.truncate(self.max_steps);
        }

        let plan = ExecutionPlan::linear(
            goal,
            commands
                .into_iter()
                .map(|command| (command, "proposed by model".to_string())),
        )
        .context("build model plan")?;
        info!(steps = plan.steps().len(), "model plan built");
        Ok(plan)
    }
}

impl<M: LanguageModel> Agent for ModelPlanner<M> {
    type Output = ExecutionPlan;

    fn role(&self) -> AgentRole {
        AgentRole::Planner
    }

    fn state(&self) -> AgentState {
        self.state
    }

    #[instrument(skip_all, fields(goal = %goal, max_steps = self.max_steps))]
    fn process(&mut self, goal: &str, context: &AgentContext) -> Result<ExecutionPlan> {
        self.state = AgentState::Thinking;
        let plan = self.plan(goal, context);
        self.state = AgentState::settled(plan.is_ok());
        plan
    }
}
