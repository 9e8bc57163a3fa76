//! Dependency-ordered execution plans.
//!
//! An [`ExecutionPlan`] owns its steps. Steps are never removed; failed steps
//! stay in place for audit. Readiness is recomputed from statuses on every
//! call, so the plan holds no cursor state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::invariants::validate_plan_invariants;
use crate::core::types::StepStatus;

/// Errors raised by plan construction and step transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("invalid plan:\n- {}", .0.join("\n- "))]
    Invalid(Vec<String>),
    #[error("unknown step id {0}")]
    UnknownStep(u32),
    #[error("step {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: u32,
        from: StepStatus,
        to: StepStatus,
    },
}

/// One atomic action with declared prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: u32,
    pub action: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub dependencies: Vec<u32>,
    #[serde(default)]
    pub status: StepStatus,
    /// Outcome text on completion, error text on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl PlanStep {
    pub fn new(
        id: u32,
        action: impl Into<String>,
        rationale: impl Into<String>,
        dependencies: Vec<u32>,
    ) -> Self {
        Self {
            id,
            action: action.into(),
            rationale: rationale.into(),
            dependencies,
            status: StepStatus::Pending,
            result: None,
        }
    }
}

/// Serialized plan shape; converted through validation on load.
#[derive(Debug, Clone, Deserialize)]
struct PlanDocument {
    goal: String,
    steps: Vec<PlanStep>,
}

impl TryFrom<PlanDocument> for ExecutionPlan {
    type Error = PlanError;

    fn try_from(doc: PlanDocument) -> Result<Self, Self::Error> {
        ExecutionPlan::new(doc.goal, doc.steps)
    }
}

/// A validated DAG of steps for one goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PlanDocument")]
pub struct ExecutionPlan {
    goal: String,
    steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Build a plan, rejecting malformed dependency graphs up front.
    pub fn new(goal: impl Into<String>, steps: Vec<PlanStep>) -> Result<Self, PlanError> {
        let errors = validate_plan_invariants(&steps);
        if !errors.is_empty() {
            return Err(PlanError::Invalid(errors));
        }
        Ok(Self {
            goal: goal.into(),
            steps,
        })
    }

    /// Build a plan where each action depends on the one before it.
    pub fn linear<I, S>(goal: impl Into<String>, actions: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let steps = actions
            .into_iter()
            .enumerate()
            .map(|(index, (action, rationale))| {
                let id = index as u32 + 1;
                let deps = if id > 1 { vec![id - 1] } else { Vec::new() };
                PlanStep::new(id, action, rationale, deps)
            })
            .collect();
        Self::new(goal, steps)
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn step(&self, id: u32) -> Option<&PlanStep> {
        // Ids are positional (validated at construction).
        id.checked_sub(1)
            .and_then(|index| self.steps.get(index as usize))
    }

    /// First pending step (lowest id) whose dependencies are all completed.
    pub fn next_ready(&self) -> Option<&PlanStep> {
        self.steps.iter().find(|step| {
            step.status == StepStatus::Pending
                && step.dependencies.iter().all(|dep| {
                    self.step(*dep)
                        .is_some_and(|d| d.status == StepStatus::Completed)
                })
        })
    }

    pub fn mark_in_progress(&mut self, id: u32) -> Result<(), PlanError> {
        self.transition(id, StepStatus::InProgress, None)
    }

    pub fn mark_completed(&mut self, id: u32, result: impl Into<String>) -> Result<(), PlanError> {
        self.transition(id, StepStatus::Completed, Some(result.into()))
    }

    pub fn mark_failed(&mut self, id: u32, error: impl Into<String>) -> Result<(), PlanError> {
        self.transition(id, StepStatus::Failed, Some(error.into()))
    }

    fn transition(
        &mut self,
        id: u32,
        to: StepStatus,
        result: Option<String>,
    ) -> Result<(), PlanError> {
        let step = id
            .checked_sub(1)
            .and_then(|index| self.steps.get_mut(index as usize))
            .ok_or(PlanError::UnknownStep(id))?;

        let allowed = match (step.status, to) {
            (StepStatus::Pending, StepStatus::InProgress) => true,
            (StepStatus::Pending | StepStatus::InProgress, StepStatus::Completed) => true,
            (StepStatus::Pending | StepStatus::InProgress, StepStatus::Failed) => true,
            (StepStatus::Pending, StepStatus::Pending)
            | (StepStatus::InProgress, StepStatus::Pending | StepStatus::InProgress)
            | (StepStatus::Completed | StepStatus::Failed, _) => false,
        };
        if !allowed {
            return Err(PlanError::InvalidTransition {
                id,
                from: step.status,
                to,
            });
        }

        step.status = to;
        if result.is_some() {
            step.result = result;
        }
        Ok(())
    }

    /// True iff every step completed. An empty plan is vacuously complete.
    pub fn is_complete(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.status == StepStatus::Completed)
    }

    /// No step can run and the plan is not complete.
    pub fn is_stalled(&self) -> bool {
        self.next_ready().is_none() && !self.is_complete()
    }

    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
            .count()
    }

    /// Completed percentage; 0 for an empty plan.
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.steps.len() as f64 * 100.0
    }

    /// Order in which steps would run if every step succeeded.
    pub fn ready_order(&self) -> Vec<u32> {
        let mut scratch = self.clone();
        let mut order = Vec::with_capacity(scratch.steps.len());
        while let Some(id) = scratch.next_ready().map(|step| step.id) {
            if scratch.mark_completed(id, "").is_err() {
                break;
            }
            order.push(id);
        }
        order
    }
}
