use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::log_tracer::LogTracer;
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, registry};

/// Directive applied when neither `RUST_LOG` nor a configured directive is present.
const DEFAULT_DIRECTIVE: &str = "info";

/// Environment variable which enables log output in tests.
const TEST_LOG_ENV_NAME: &str = "ENABLE_TRACING";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("invalid log filter directive: {0}")]
    InvalidDirective(#[from] ParseError),

    #[error("failed to install the log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to initialize the subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the background log writer alive.
///
/// Buffered log lines are flushed when this value is dropped, so it must be held until the
/// process is about to exit.
#[must_use = "dropping the flusher stops log output"]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global tracing subscriber for `app_name`.
///
/// The filter comes from `RUST_LOG`, then `fallback_directive`, then `info`. Output goes to
/// stderr through a non-blocking writer since stdout carries change records.
pub fn init_tracing(
    app_name: &str,
    fallback_directive: Option<&str>,
) -> Result<LogFlusher, TracingError> {
    LogTracer::init()?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback_directive.unwrap_or(DEFAULT_DIRECTIVE))?,
    };

    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_target(true))
        .try_init()?;

    tracing::info!(app_name, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber once per process.
///
/// Output is captured by the test harness and only enabled when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        if std::env::var(TEST_LOG_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

        let _ = registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
