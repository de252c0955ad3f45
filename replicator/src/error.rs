use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use replicant::error::{ErrorKind, ReplicantError};

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type of the replicator binary.
pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    /// Captures the backtrace at the point a variant is built.
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    /// Prints the captured frames.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the replicator service.
///
/// Pipeline failures keep their [`ReplicantError`] so their kinds stay inspectable, everything
/// that happens before the pipeline exists is a configuration or I/O error.
#[derive(Debug)]
pub enum ReplicatorError {
    /// Pipeline error.
    Replicant(ReplicantError),
    /// Configuration or startup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl ReplicatorError {
    /// Short label printed in the first lines of the report.
    pub fn category(&self) -> &'static str {
        match self {
            ReplicatorError::Replicant(_) => "replicator error",
            ReplicatorError::Config(_, _) => "configuration error",
            ReplicatorError::Io(_, _) => "i/o error",
        }
    }

    /// Backtrace of the wrapped error, taken from the pipeline error when there is one.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ReplicatorError::Replicant(err) => err.backtrace(),
            ReplicatorError::Config(_, cb) => Some(&cb.0),
            ReplicatorError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Kinds of the wrapped pipeline error, empty for other variants.
    pub fn replicant_kinds(&self) -> Vec<ErrorKind> {
        match self {
            ReplicatorError::Replicant(err) => err.kinds(),
            _ => Vec::new(),
        }
    }

    /// Wraps any loading or validation error as a configuration error.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReplicatorError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Renders the report printed to stderr before the process exits with a failure.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("replicator failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        // Aggregated pipeline errors already list every error in their display.
        if self.replicant_kinds().len() <= 1 {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for ReplicatorError {
    /// One line description used in logs and as the report's `error:` line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicatorError::Replicant(err) => write!(f, "{err}"),
            ReplicatorError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReplicatorError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ReplicatorError {
    /// Direct cause of the wrapped error.
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplicatorError::Replicant(err) => err.source(),
            ReplicatorError::Config(source, _) => Some(source.as_ref()),
            ReplicatorError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for ReplicatorError {
    /// Wraps an I/O failure, capturing a backtrace.
    fn from(err: std::io::Error) -> Self {
        ReplicatorError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<ReplicantError> for ReplicatorError {
    /// Wraps a pipeline failure as is.
    fn from(err: ReplicantError) -> Self {
        ReplicatorError::Replicant(err)
    }
}
