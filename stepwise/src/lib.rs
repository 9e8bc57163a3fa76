//! Execution-control core for a terminal assistant.
//!
//! Goals are classified, routed to a reasoning strategy, and every shell
//! command passes through verification, human approval and bounded retries
//! before it runs. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (verifier, classifier, plan
//!   scheduling, tag extraction). No I/O.
//! - **[`io`]**: Side-effecting adapters (shell, approval prompts, config,
//!   prompt templates, snapshot files) behind traits so tests can script them.
//! - **[`agents`]** and **[`reasoning`]**: planners, the retrying executor,
//!   the ReAct loop and chain of thought.
//!
//! [`orchestrator::Orchestrator`] ties these together and owns the
//! [`session::SessionState`]; [`assistant::Assistant`] runs the model
//! conversation loop on top of it.

pub mod agents;
pub mod assistant;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod knowledge;
pub mod logging;
pub mod orchestrator;
pub mod reasoning;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
