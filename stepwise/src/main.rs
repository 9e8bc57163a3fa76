//! Terminal assistant execution core.
//!
//! Routes a goal through the orchestrator, or exposes the verifier, the
//! retrying executor, the classifier and plan-file validation on their own.
//! Commands always pass through the approval prompt on stdin unless the
//! config disables it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use jsonschema::Draft;
use serde_json::Value;
use stepwise::agents::executor::RetryingExecutor;
use stepwise::agents::planner::estimate_plan_complexity;
use stepwise::core::classifier::{classify_complexity, select_strategy};
use stepwise::core::plan::ExecutionPlan;
use stepwise::core::verifier::verify;
use stepwise::exit_codes;
use stepwise::io::approval::TerminalPrompter;
use stepwise::io::config::{AgentConfig, load_config};
use stepwise::io::session_store::{load_snapshot, save_snapshot};
use stepwise::io::shell::ShellCommandRunner;
use stepwise::knowledge::InMemoryKnowledgeStore;
use stepwise::logging;
use stepwise::orchestrator::{Orchestrator, ProcessContext};

const PLAN_SCHEMA: &str = include_str!("../schemas/plan.schema.json");

#[derive(Parser)]
#[command(
    name = "stepwise",
    version,
    about = "Verified, approved and retried command execution for a terminal assistant"
)]
struct Cli {
    /// Agent config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "stepwise.toml")]
    config: PathBuf,
    /// Session snapshot file loaded before and saved after `run`.
    #[arg(long, global = true)]
    state: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a goal, pick a strategy and carry it out.
    Run {
        /// Goal in natural language.
        goal: String,
    },
    /// Check a command against the dangerous-pattern list.
    Verify { command: String },
    /// Run one command with verification, approval and retries.
    Exec { command: String },
    /// Print the complexity and strategy chosen for a goal.
    Classify { goal: String },
    /// Validate a JSON plan file and print its execution order.
    Plan { file: PathBuf },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Verify { command } => Ok(cmd_verify(&command)),
        Command::Plan { file } => cmd_plan(&file),
        Command::Classify { goal } => {
            let config = load_config(&cli.config)?;
            Ok(cmd_classify(&config, &goal))
        }
        Command::Exec { command } => {
            let config = load_config(&cli.config)?;
            cmd_exec(&config, &command)
        }
        Command::Run { goal } => {
            let config = load_config(&cli.config)?;
            cmd_run(config, cli.state.as_deref(), &goal)
        }
    }
}

fn cmd_verify(command: &str) -> i32 {
    let verdict = verify(command);
    if verdict.is_safe {
        println!("safe: {}", verdict.reason);
        exit_codes::OK
    } else {
        println!("unsafe: {}", verdict.reason);
        exit_codes::UNSAFE
    }
}

fn cmd_classify(config: &AgentConfig, goal: &str) -> i32 {
    let complexity = classify_complexity(goal);
    let strategy = select_strategy(complexity, config.toggles());
    println!("complexity: {complexity}");
    println!("strategy: {strategy}");
    exit_codes::OK
}

fn cmd_exec(config: &AgentConfig, command: &str) -> Result<i32> {
    let mut executor = RetryingExecutor::from_config(
        shell_runner(config),
        TerminalPrompter::new(std::io::stdin().lock(), std::io::stderr()),
        config,
    );
    let outcome = executor.run_default(command);
    print_block(outcome.detail())?;
    Ok(if outcome.success {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn cmd_run(config: AgentConfig, state: Option<&Path>, goal: &str) -> Result<i32> {
    let runner = shell_runner(&config);
    let prompter = TerminalPrompter::new(std::io::stdin().lock(), std::io::stderr());
    let mut orchestrator = Orchestrator::new(config, runner, prompter);
    if let Some(path) = state
        && let Some(snapshot) = load_snapshot(path)?
    {
        orchestrator.session_mut().import(snapshot);
    }
    let session = orchestrator.session_mut();
    session.set_environment("os", Value::String(std::env::consts::OS.to_string()));
    if let Ok(cwd) = std::env::current_dir() {
        session.set_environment("cwd", Value::String(cwd.display().to_string()));
    }

    let mut knowledge = InMemoryKnowledgeStore::new();
    let mut ctx = ProcessContext {
        knowledge: Some(&mut knowledge),
        ..ProcessContext::default()
    };
    let outcome = orchestrator.process(goal, &mut ctx);
    print_block(&outcome.response)?;

    if let Some(path) = state {
        save_snapshot(path, &orchestrator.session().export())?;
    }
    Ok(if outcome.success {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn cmd_plan(file: &Path) -> Result<i32> {
    let raw = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let plan = validate_plan(&raw)?;
    let order: Vec<String> = plan.ready_order().iter().map(u32::to_string).collect();
    println!("goal: {}", plan.goal());
    println!("steps: {}", plan.steps().len());
    println!("complexity: {}", estimate_plan_complexity(&plan));
    println!("order: {}", order.join(" "));
    Ok(exit_codes::OK)
}

fn shell_runner(config: &AgentConfig) -> ShellCommandRunner {
    ShellCommandRunner::new(
        Duration::from_secs(config.command_timeout_secs),
        config.output_limit_bytes,
    )
}

/// Print `text` to stdout with exactly one trailing newline.
fn print_block(text: &str) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", text.trim_end()).context("write stdout")?;
    Ok(())
}

/// Parse and validate a plan: schema conformance + plan invariants.
fn validate_plan(raw: &str) -> Result<ExecutionPlan> {
    let instance: Value = serde_json::from_str(raw).context("parse plan json")?;
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")?;
    validate_schema(&instance, &schema)?;
    let plan: ExecutionPlan = serde_json::from_value(instance).context("check plan invariants")?;
    Ok(plan)
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_global_flags() {
        let cli = Cli::parse_from(["stepwise", "run", "list files", "--state", "s.json"]);
        assert!(matches!(cli.command, Command::Run { ref goal } if goal == "list files"));
        assert_eq!(cli.state.as_deref(), Some(Path::new("s.json")));
        assert_eq!(cli.config, PathBuf::from("stepwise.toml"));
    }

    #[test]
    fn parse_plan() {
        let cli = Cli::parse_from(["stepwise", "--config", "c.toml", "plan", "p.json"]);
        assert!(matches!(cli.command, Command::Plan { ref file } if file == Path::new("p.json")));
        assert_eq!(cli.config, PathBuf::from("c.toml"));
    }

    #[test]
    fn embedded_schema_accepts_valid_plan() {
        let plan = validate_plan(
            r#"{"goal":"ship","steps":[
                {"id":1,"action":"cargo build"},
                {"id":2,"action":"cargo test","dependencies":[1]}
            ]}"#,
        )
        .expect("valid plan");
        assert_eq!(plan.ready_order(), vec![1, 2]);
    }

    #[test]
    fn schema_rejects_unknown_fields() {
        let err = validate_plan(r#"{"goal":"ship","steps":[{"id":1,"action":"a","extra":1}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn invariants_reject_forward_dependencies() {
        let err = validate_plan(
            r#"{"goal":"ship","steps":[
                {"id":1,"action":"a","dependencies":[2]},
                {"id":2,"action":"b"}
            ]}"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("must reference an earlier step"));
    }
}
