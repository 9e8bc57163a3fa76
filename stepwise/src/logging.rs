//! Diagnostic tracing for the stepwise binary.
//!
//! Tracing output is for debugging only and goes to stderr. Responses, plan
//! summaries and verdicts are printed to stdout by the CLI and are not
//! affected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, falling back to `warn`. Compact format on stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=stepwise=debug stepwise run "list files"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
