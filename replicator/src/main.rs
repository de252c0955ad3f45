//! Replicator service binary.
//!
//! Loads the configuration, installs tracing, then streams changes of the configured replication
//! slot to the enabled sinks until a shutdown signal or a fatal error. The process exits with a
//! non-zero status when the pipeline failed.

use std::process::ExitCode;

use telemetry::tracing::init_tracing;

use crate::config::load_replicator_config;
use crate::core::start_replicator_with_config;
use crate::error::{ReplicatorError, ReplicatorResult};

mod config;
mod core;
mod error;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> ReplicatorResult<()> {
    let replicator_config = load_replicator_config()?;

    // Logs go to stderr, stdout is reserved for the stdout sink.
    let _log_flusher = init_tracing(
        env!("CARGO_BIN_NAME"),
        replicator_config.log_level.as_deref(),
    )
    .map_err(ReplicatorError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_replicator_with_config(replicator_config))
}
