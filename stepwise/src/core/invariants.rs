//! Structural invariants for execution plans.

use std::collections::HashSet;

use crate::core::plan::PlanStep;

/// Check plan invariants:
/// - Step ids are exactly `1..=N` in order (dependencies are positional)
/// - Dependencies reference earlier steps only (no self reference, no cycles)
/// - No duplicate dependency ids on one step
/// - Actions are non-empty
pub fn validate_plan_invariants(steps: &[PlanStep]) -> Vec<String> {
    let mut errors = Vec::new();

    for (index, step) in steps.iter().enumerate() {
        let expected = index as u32 + 1;
        if step.id != expected {
            errors.push(format!(
                "step at position {expected} has id {} (ids must be 1..N without gaps)",
                step.id
            ));
        }

        if step.action.trim().is_empty() {
            errors.push(format!("step {}: action must not be empty", step.id));
        }

        let mut seen = HashSet::new();
        for &dep in &step.dependencies {
            if dep == step.id {
                errors.push(format!("step {}: depends on itself", step.id));
            } else if dep == 0 || dep > step.id {
                errors.push(format!(
                    "step {}: dependency {dep} must reference an earlier step",
                    step.id
                ));
            }
            if !seen.insert(dep) {
                errors.push(format!("step {}: duplicate dependency {dep}", step.id));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: u32, deps: &[u32]) -> PlanStep {
        PlanStep::new(id, format!("action-{id}"), "why", deps.to_vec())
    }

    #[test]
    fn linear_plan_is_valid() {
        let steps = vec![step(1, &[]), step(2, &[1]), step(3, &[1, 2])];
        assert!(validate_plan_invariants(&steps).is_empty());
    }

    #[test]
    fn reports_gaps_self_reference_and_forward_edges() {
        let steps = vec![step(1, &[1]), step(3, &[4]), step(3, &[2, 2])];
        let errors = validate_plan_invariants(&steps);
        assert!(errors.iter().any(|err| err.contains("depends on itself")));
        assert!(errors.iter().any(|err| err.contains("without gaps")));
        assert!(errors.iter().any(|err| err.contains("earlier step")));
        assert!(errors.iter().any(|err| err.contains("duplicate dependency")));
    }

    #[test]
    fn empty_action_is_rejected() {
        let mut only = step(1, &[]);
        only.action = "  ".to_string();
        let errors = validate_plan_invariants(&[only]);
        assert_eq!(errors, vec!["step 1: action must not be empty".to_string()]);
    }
}
