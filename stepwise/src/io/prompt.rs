//! Prompt templates rendered for the language model.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const REACT_THINK_TEMPLATE: &str = include_str!("prompts/react_think.md");
const REACT_ACT_TEMPLATE: &str = include_str!("prompts/react_act.md");

#[derive(Debug, Clone, Serialize)]
struct ContextItem<'a> {
    key: &'a str,
    value: String,
}

/// Input for the ReAct "think" prompt.
#[derive(Debug, Clone)]
pub struct ThinkPrompt<'a> {
    pub goal: &'a str,
    pub iteration: u32,
    pub trace: Vec<String>,
    pub last_observation: Option<&'a str>,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .context("load system template")?;
        env.add_template("plan", PLAN_TEMPLATE)
            .context("load plan template")?;
        env.add_template("react_think", REACT_THINK_TEMPLATE)
            .context("load react_think template")?;
        env.add_template("react_act", REACT_ACT_TEMPLATE)
            .context("load react_act template")?;
        Ok(Self { env })
    }

    /// System message; `knowledge` is appended when non-blank.
    pub fn render_system(&self, knowledge: &str) -> Result<String> {
        let template = self.env.get_template("system")?;
        let knowledge = Some(knowledge.trim()).filter(|text| !text.is_empty());
        Ok(template.render(context! { knowledge })?.trim().to_string())
    }

    pub fn render_plan(&self, goal: &str, context: &BTreeMap<String, Value>) -> Result<String> {
        let items: Vec<ContextItem<'_>> = context
            .iter()
            .map(|(key, value)| ContextItem {
                key,
                value: match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                },
            })
            .collect();
        let template = self.env.get_template("plan")?;
        let rendered = template.render(context! {
            goal => goal.trim(),
            context => items,
        })?;
        Ok(rendered.trim().to_string())
    }

    pub fn render_think(&self, input: &ThinkPrompt<'_>) -> Result<String> {
        let template = self.env.get_template("react_think")?;
        let rendered = template.render(context! {
            goal => input.goal.trim(),
            iteration => input.iteration,
            trace => &input.trace,
            last_observation => input.last_observation.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        Ok(rendered.trim().to_string())
    }

    pub fn render_act(&self, goal: &str, thought: &str, actions: &[String]) -> Result<String> {
        let template = self.env.get_template("react_act")?;
        let rendered = template.render(context! {
            goal => goal.trim(),
            thought => thought.trim(),
            actions => actions,
        })?;
        Ok(rendered.trim().to_string())
    }
}
