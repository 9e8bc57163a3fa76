//! End-to-end orchestrator scenarios driven by scripted fakes.
//!
//! These tests exercise routing, plan execution through the approval gate,
//! knowledge recording, and session persistence across orchestrator instances.

use stepwise::agents::planner::ModelPlanner;
use stepwise::core::types::{Complexity, StepStatus, Strategy};
use stepwise::io::config::AgentConfig;
use stepwise::io::session_store::{load_snapshot, save_snapshot};
use stepwise::knowledge::{InMemoryKnowledgeStore, KnowledgeQuery, KnowledgeStore};
use stepwise::orchestrator::{Orchestrator, ProcessContext, StrategyDetail};
use stepwise::session::Role;
use stepwise::test_support::{ScriptedModel, ScriptedPrompter, ScriptedRun, ScriptedRunner};

const MODEL_PLAN: &str = "\
Build first, then test.
<mcp:terminal>cargo build</mcp:terminal>
<mcp:terminal>cargo test</mcp:terminal>";

/// Model-proposed plan executed step by step, each step approved by the operator.
#[test]
fn model_plan_runs_with_approval_for_every_step() {
    let model = ScriptedModel::new(vec![MODEL_PLAN]);
    let runner = ScriptedRunner::new(vec![
        ScriptedRun::ok("Finished dev profile"),
        ScriptedRun::ok("test result: ok. 12 passed"),
    ]);
    let mut orch = Orchestrator::new(AgentConfig::default(), runner, ScriptedPrompter::approving(2))
        .with_planner(ModelPlanner::new(&model, 10).expect("planner"));

    let mut store = InMemoryKnowledgeStore::new();
    let mut ctx = ProcessContext {
        knowledge: Some(&mut store),
        ..ProcessContext::default()
    };
    let outcome = orch.process("deploy the service", &mut ctx);

    assert!(outcome.success, "{}", outcome.response);
    assert_eq!(outcome.complexity, Complexity::High);
    assert_eq!(outcome.strategy, Strategy::Planning);
    assert_eq!(
        outcome.response,
        "Executed plan for: deploy the service\nProgress: 100%\n\n✓ Step 1: cargo build\n✓ Step 2: cargo test"
    );

    let asked: Vec<&str> = orch
        .executor()
        .gate()
        .prompter()
        .asked()
        .iter()
        .map(|(command, _)| command.as_str())
        .collect();
    assert_eq!(asked, vec!["cargo build", "cargo test"]);

    let hits = store.search(&KnowledgeQuery {
        tags: vec!["success".to_string()],
        ..KnowledgeQuery::default()
    });
    assert_eq!(hits.len(), 2);

    let turns = orch.session().conversation();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].metadata["complexity"], "high");
    assert_eq!(orch.session().active_goals().count(), 0);
}

/// A denied step aborts the plan, is not recorded as an execution, and leaves
/// the goal active.
#[test]
fn denied_step_aborts_plan() {
    let model = ScriptedModel::new(vec![MODEL_PLAN]);
    let runner = ScriptedRunner::new(vec![ScriptedRun::ok("Finished dev profile")]);
    let prompter = ScriptedPrompter::new(vec![Some("y"), Some("no")]);
    let mut orch = Orchestrator::new(AgentConfig::default(), runner, prompter)
        .with_planner(ModelPlanner::new(&model, 10).expect("planner"));

    let outcome = orch.process("deploy the service", &mut ProcessContext::default());

    assert!(!outcome.success);
    assert!(outcome.response.contains("Progress: 50%"));
    assert!(outcome.response.contains("✗ Step 2: cargo test"));
    let StrategyDetail::Planning { plan, runs, .. } = outcome.detail else {
        panic!("expected planning detail");
    };
    assert_eq!(runs.len(), 2);
    assert!(!runs[1].outcome.approved);
    assert_eq!(plan.step(2).map(|step| step.status), Some(StepStatus::Failed));
    assert_eq!(orch.executor().runner().started(), vec!["cargo build"]);
    let executions = orch.session().executions();
    assert_eq!(executions.len(), 2);
    assert!(executions[0].success);
    assert_eq!(executions[1].action, "cargo test");
    assert!(!executions[1].success);
    assert_eq!(orch.session().active_goals().count(), 1);
}

/// Session state written after one run is visible to the next orchestrator.
#[test]
fn session_survives_snapshot_round_trip() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("session.json");
    let mut config = AgentConfig::default();
    config.require_approval = false;
    config.strategy.use_react = false;

    let mut first = Orchestrator::new(
        config.clone(),
        ScriptedRunner::default(),
        ScriptedPrompter::default(),
    );
    first
        .session_mut()
        .set_context("cwd", serde_json::json!("/srv/app"));
    first.process("list the logs", &mut ProcessContext::default());
    first.process("deploy the app", &mut ProcessContext::default());
    let exported = first.session().export();
    save_snapshot(&path, &exported).expect("save");

    let loaded = load_snapshot(&path).expect("load").expect("snapshot present");
    let mut second = Orchestrator::new(config, ScriptedRunner::default(), ScriptedPrompter::default());
    second.session_mut().import(loaded);

    assert_eq!(second.session().export(), exported);
    assert_eq!(second.session().session_id(), first.session().session_id());
    assert_eq!(second.session().conversation().len(), 4);
    assert_eq!(second.session().executions().len(), 4);
    assert_eq!(
        second.session().context("cwd"),
        Some(&serde_json::json!("/srv/app"))
    );

    let status = second.status();
    assert_eq!(status.session.conversation_turns, 4);
    assert!(!status.use_react);
}

/// Routing failures surface as responses and the orchestrator keeps working.
#[test]
fn planner_failure_is_reported_and_recovered() {
    let model = ScriptedModel::new(vec!["I would rather not."]);
    let mut orch = Orchestrator::new(
        AgentConfig::default(),
        ScriptedRunner::default(),
        ScriptedPrompter::default(),
    )
    .with_planner(ModelPlanner::new(&model, 10).expect("planner"));

    let failed = orch.process("setup the database", &mut ProcessContext::default());
    assert!(!failed.success);
    assert!(failed.response.starts_with("I encountered an error:"));
    assert!(failed.response.contains("model proposed no commands"));

    let next = orch.process("show me the time", &mut ProcessContext::default());
    assert_eq!(next.strategy, Strategy::Reasoning);
    assert_eq!(orch.session().conversation().len(), 4);
}

/// The store is optional; executions still land in the session log.
#[test]
fn knowledge_store_is_optional() {
    let mut config = AgentConfig::default();
    config.require_approval = false;
    let mut orch = Orchestrator::new(config, ScriptedRunner::default(), ScriptedPrompter::default());
    let outcome = orch.process("analyze and fix the disk", &mut ProcessContext::default());
    assert!(outcome.success);
    assert_eq!(orch.session().executions().len(), 3);
    assert!(
        orch.session()
            .executions()
            .iter()
            .all(|record| record.agent_name == "executor" && record.success)
    );
}
