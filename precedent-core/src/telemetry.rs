//! Logging setup. A single `init()` call installs a `tracing-subscriber`
//! fmt layer driven by `RUST_LOG`, the way the teacher wires up
//! `tracing` for its validator and orchestrator stages.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
