//! Goal router: classify, pick a strategy, run it, record the outcome.
//!
//! The orchestrator is the only writer of [`SessionState`] and the only place
//! where errors become user-facing text. Nothing below it is allowed to turn
//! a failure into a response string.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::agents::executor::RetryingExecutor;
use crate::agents::planner::TemplatePlanner;
use crate::agents::{Agent, AgentRole};
use crate::core::classifier::{StrategyToggles, classify_complexity, select_strategy};
use crate::core::plan::ExecutionPlan;
use crate::core::types::{CommandOutcome, Complexity, ReActStep, Strategy, ThoughtStep};
use crate::io::approval::Prompter;
use crate::io::config::AgentConfig;
use crate::io::shell::CommandRunner;
use crate::knowledge::KnowledgeStore;
use crate::reasoning::cot::ChainOfThought;
use crate::reasoning::react::{DefaultReasoner, Reasoner, ReasoningLoop};
use crate::reasoning::registry::ActionRegistry;
use crate::session::{Role, SessionState, SessionSummary};

/// Per-call inputs threaded from the entry point.
#[derive(Default)]
pub struct ProcessContext<'k> {
    /// Extra values visible to planners and reasoners. They override session
    /// context values with the same key.
    pub values: BTreeMap<String, Value>,
    /// Where executed commands are recorded, if anywhere. Entries relevant to
    /// the goal are also handed to planners and reasoners under
    /// [`KNOWLEDGE_KEY`].
    pub knowledge: Option<&'k mut dyn KnowledgeStore>,
}

/// Context key carrying the knowledge block for the current goal.
pub const KNOWLEDGE_KEY: &str = "knowledge";

/// Knowledge entries handed to planners per goal.
pub const KNOWLEDGE_ENTRIES: usize = 5;

/// One plan step as it was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRun {
    pub step_id: u32,
    pub outcome: CommandOutcome,
}

/// Strategy-specific result data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDetail {
    Direct,
    ChainOfThought {
        steps: Vec<ThoughtStep>,
        conclusion: Option<String>,
    },
    Reasoning {
        iterations: u32,
        trace: Vec<ReActStep>,
    },
    Planning {
        plan: ExecutionPlan,
        runs: Vec<StepRun>,
        /// No step could run although the plan was not complete.
        stalled: bool,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub response: String,
    pub complexity: Complexity,
    pub strategy: Strategy,
    pub detail: StrategyDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStatus {
    pub session: SessionSummary,
    pub use_cot: bool,
    pub use_react: bool,
    pub use_planning: bool,
    pub require_approval: bool,
    pub auto_approve: bool,
    pub executor_history: usize,
}

struct StrategyResult {
    success: bool,
    response: String,
    detail: StrategyDetail,
}

pub struct Orchestrator<'a, R, P> {
    config: AgentConfig,
    toggles: StrategyToggles,
    executor: RetryingExecutor<R, P>,
    planner: Box<dyn Agent<Output = ExecutionPlan> + 'a>,
    reasoner: Box<dyn Reasoner + 'a>,
    react: ReasoningLoop,
    cot: ChainOfThought,
    session: SessionState,
}

impl<'a, R: CommandRunner, P: Prompter> Orchestrator<'a, R, P> {
    /// Orchestrator with the template planner and the template reasoner.
    pub fn new(config: AgentConfig, runner: R, prompter: P) -> Self {
        let executor = RetryingExecutor::from_config(runner, prompter, &config);
        Self {
            toggles: config.toggles(),
            executor,
            planner: Box::new(TemplatePlanner::new()),
            reasoner: Box::new(DefaultReasoner),
            react: ReasoningLoop::new(config.react.max_iterations),
            cot: ChainOfThought::new(),
            session: SessionState::new(config.history.result_bytes),
            config,
        }
    }

    pub fn with_planner(mut self, planner: impl Agent<Output = ExecutionPlan> + 'a) -> Self {
        self.planner = Box::new(planner);
        self
    }

    pub fn with_reasoner(mut self, reasoner: impl Reasoner + 'a) -> Self {
        self.reasoner = Box::new(reasoner);
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn executor(&self) -> &RetryingExecutor<R, P> {
        &self.executor
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one command through the executor and record it like a plan step.
    pub fn execute_command(
        &mut self,
        command: &str,
        ctx: &mut ProcessContext<'_>,
    ) -> CommandOutcome {
        let outcome = self.executor.run_default(command);
        record_execution(
            &mut self.session,
            ctx.knowledge.as_deref_mut(),
            command,
            &outcome,
        );
        outcome
    }

    /// Process one goal end to end. Never fails: internal errors become an
    /// unsuccessful outcome whose response starts with "I encountered an error".
    #[instrument(skip_all, fields(session_id = %self.session.session_id()))]
    pub fn process(&mut self, goal: &str, ctx: &mut ProcessContext<'_>) -> ProcessOutcome {
        self.session.add_turn(Role::User, goal);

        let complexity = classify_complexity(goal);
        let strategy = select_strategy(complexity, self.toggles);
        info!(%complexity, %strategy, "goal routed");
        let metadata = BTreeMap::from([
            ("complexity".to_string(), complexity.to_string()),
            ("strategy".to_string(), strategy.to_string()),
        ]);
        let goal_id = self.session.add_goal_with(goal, 1, metadata.clone());

        let mut values = self.session.context_values().clone();
        if let Some(store) = ctx.knowledge.as_deref() {
            let block = store.context_for_query(goal, KNOWLEDGE_ENTRIES);
            if !block.is_empty() {
                values.insert(KNOWLEDGE_KEY.to_string(), Value::String(block));
            }
        }
        values.extend(ctx.values.iter().map(|(k, v)| (k.clone(), v.clone())));

        let result = match strategy {
            Strategy::Direct => Ok(StrategyResult {
                success: true,
                response: format!("Processing: {goal}"),
                detail: StrategyDetail::Direct,
            }),
            Strategy::ChainOfThought => Ok(self.run_chain_of_thought(goal, &values)),
            Strategy::Reasoning => self.run_reasoning(goal, values, ctx),
            Strategy::Planning => self.run_planning(goal, values, ctx),
        };

        let result = result.unwrap_or_else(|err| {
            error!(err = %format!("{err:#}"), "goal processing failed");
            StrategyResult {
                success: false,
                response: format!("I encountered an error: {err:#}"),
                detail: StrategyDetail::Failed {
                    error: format!("{err:#}"),
                },
            }
        });

        self.session
            .add_turn_with(Role::Assistant, result.response.clone(), metadata);
        if result.success {
            self.session.complete_goal(goal_id);
        }
        self.record_agent_states();

        ProcessOutcome {
            success: result.success,
            response: result.response,
            complexity,
            strategy,
            detail: result.detail,
        }
    }

    fn run_chain_of_thought(
        &mut self,
        goal: &str,
        values: &BTreeMap<String, Value>,
    ) -> StrategyResult {
        let steps = self.cot.think(goal, values).to_vec();
        StrategyResult {
            success: true,
            response: self.cot.format_for_display(true),
            detail: StrategyDetail::ChainOfThought {
                conclusion: self.cot.conclusion().map(str::to_string),
                steps,
            },
        }
    }

    fn run_reasoning(
        &mut self,
        goal: &str,
        values: BTreeMap<String, Value>,
        ctx: &mut ProcessContext<'_>,
    ) -> Result<StrategyResult> {
        let executor = &mut self.executor;
        let session = &mut self.session;
        let mut knowledge = ctx.knowledge.as_deref_mut();

        let mut registry = ActionRegistry::new();
        registry.register_fn("execute_command", |command, _| {
            let outcome = executor.run_default(command);
            record_execution(session, knowledge.as_deref_mut(), command, &outcome);
            if outcome.success {
                Ok(outcome.detail().to_string())
            } else {
                Err(anyhow!("{}", outcome.detail()))
            }
        });
        registry.register_fn("get_info", |key, react_ctx| {
            if key.is_empty() {
                let keys: Vec<&str> = react_ctx.values.keys().map(String::as_str).collect();
                return Ok(format!("known keys: [{}]", keys.join(", ")));
            }
            react_ctx
                .values
                .get(key)
                .map(|value| match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .ok_or_else(|| anyhow!("no information about '{key}'"))
        });

        let outcome = self
            .react
            .run(goal, values, self.reasoner.as_mut(), &mut registry)
            .context("reasoning loop")?;

        Ok(StrategyResult {
            success: outcome.success,
            response: self.react.format_trace(),
            detail: StrategyDetail::Reasoning {
                iterations: outcome.iterations,
                trace: outcome.trace,
            },
        })
    }

    fn run_planning(
        &mut self,
        goal: &str,
        mut values: BTreeMap<String, Value>,
        ctx: &mut ProcessContext<'_>,
    ) -> Result<StrategyResult> {
        if self.toggles.use_cot {
            self.cot.think(goal, &values);
            values.insert(
                "cot".to_string(),
                Value::String(self.cot.format_for_display(false)),
            );
        }

        let mut plan = self.planner.process(goal, &values).context("create plan")?;
        info!(steps = plan.steps().len(), "plan created");

        let mut runs = Vec::new();
        let mut stalled = false;
        loop {
            let Some(step) = plan.next_ready() else {
                stalled = !plan.is_complete();
                if stalled {
                    warn!(
                        completed = plan.completed_count(),
                        total = plan.steps().len(),
                        "plan stalled"
                    );
                }
                break;
            };
            let (id, action) = (step.id, step.action.clone());

            plan.mark_in_progress(id)?;
            info!(step = id, action = %action, "executing plan step");
            let outcome = self.executor.run_default(&action);
            record_execution(
                &mut self.session,
                ctx.knowledge.as_deref_mut(),
                &action,
                &outcome,
            );

            let succeeded = outcome.success;
            if succeeded {
                plan.mark_completed(id, outcome.detail())?;
            } else {
                plan.mark_failed(id, outcome.detail())?;
            }
            runs.push(StepRun {
                step_id: id,
                outcome,
            });
            if !succeeded {
                warn!(step = id, "plan step failed, aborting plan");
                break;
            }
        }

        let mut response = plan_summary(&plan);
        if stalled {
            response.push_str(&format!(
                "\n\nPlan stalled: {}/{} steps completed",
                plan.completed_count(),
                plan.steps().len()
            ));
        }

        Ok(StrategyResult {
            success: plan.is_complete(),
            response,
            detail: StrategyDetail::Planning {
                plan,
                runs,
                stalled,
            },
        })
    }

    fn record_agent_states(&mut self) {
        let planner = (self.planner.role(), self.planner.state());
        let executor = (self.executor.role(), self.executor.state());
        for (role, state) in [planner, executor] {
            self.session.set_agent_state(role.as_str(), state);
        }
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            session: self.session.summary(),
            use_cot: self.toggles.use_cot,
            use_react: self.toggles.use_react,
            use_planning: self.toggles.use_planning,
            require_approval: self.executor.gate().require_approval,
            auto_approve: self.executor.gate().auto_approve,
            executor_history: self.executor.history().len(),
        }
    }
}

/// Record a command the operator decided on in the session log and, when it
/// actually ran, in the knowledge store.
///
/// Denied commands are logged as unsuccessful. Empty commands never reach
/// the operator and are not logged.
fn record_execution<K: KnowledgeStore + ?Sized>(
    session: &mut SessionState,
    knowledge: Option<&mut K>,
    command: &str,
    outcome: &CommandOutcome,
) {
    if !outcome.approved && !outcome.denied {
        return;
    }
    session.add_execution(
        AgentRole::Executor.as_str(),
        command,
        outcome.detail(),
        outcome.success,
    );
    if let Some(store) = knowledge
        && outcome.executed
    {
        store.add_command_execution(command, outcome.detail(), outcome.success);
    }
}

/// Human-readable plan report with one status glyph per step.
pub fn plan_summary(plan: &ExecutionPlan) -> String {
    let mut lines = vec![
        format!("Executed plan for: {}", plan.goal()),
        format!("Progress: {:.0}%", plan.progress()),
        String::new(),
    ];
    for step in plan.steps() {
        lines.push(format!(
            "{} Step {}: {}",
            step.status.glyph(),
            step.id,
            step.action
        ));
    }
    lines.join("\n")
}
