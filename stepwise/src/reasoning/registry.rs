//! Name → handler mapping for reasoning-loop actions.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::reasoning::react::ReactContext;

/// Dispatch failures. The display text doubles as the loop's observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Unknown action: {0}")]
    Unknown(String),
    #[error("Action '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// A typed action the reasoning loop can invoke.
pub trait ActionHandler {
    fn call(&mut self, params: &str, context: &ReactContext) -> anyhow::Result<String>;
}

impl<F> ActionHandler for F
where
    F: FnMut(&str, &ReactContext) -> anyhow::Result<String>,
{
    fn call(&mut self, params: &str, context: &ReactContext) -> anyhow::Result<String> {
        self(params, context)
    }
}

/// Split `name:params` into a trimmed name and trimmed (possibly empty) params.
pub fn parse_action(action: &str) -> (&str, &str) {
    match action.split_once(':') {
        Some((name, params)) => (name.trim(), params.trim()),
        None => (action.trim(), ""),
    }
}

#[derive(Default)]
pub struct ActionRegistry<'a> {
    handlers: BTreeMap<String, Box<dyn ActionHandler + 'a>>,
}

impl<'a> ActionRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier handler.
    pub fn register(&mut self, name: impl Into<String>, handler: impl ActionHandler + 'a) {
        let name = name.into();
        debug!(action = %name, "action registered");
        self.handlers.insert(name, Box::new(handler));
    }

    /// Register a closure handler; signature inference works without annotations.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: FnMut(&str, &ReactContext) -> anyhow::Result<String> + 'a,
    {
        self.register(name, handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Parse `action` and run the matching handler.
    ///
    /// Returns the action name with the handler's result.
    pub fn dispatch(
        &mut self,
        action: &str,
        context: &ReactContext,
    ) -> Result<(String, String), ActionError> {
        let (name, params) = parse_action(action);
        let handler = self
            .handlers
            .get_mut(name)
            .ok_or_else(|| ActionError::Unknown(name.to_string()))?;
        handler
            .call(params, context)
            .map(|result| (name.to_string(), result))
            .map_err(|err| ActionError::Failed {
                name: name.to_string(),
                message: format!("{err:#}"),
            })
    }
}
