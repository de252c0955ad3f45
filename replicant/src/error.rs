//! Error types and result definitions for the replication pipeline.
//!
//! Every fallible operation returns [`ReplicantResult`]. A [`ReplicantError`] carries an
//! [`ErrorKind`] used to decide whether a failure is fatal, a static description, optional dynamic
//! detail and source, and the callsite where it was created. Failures of several workers during
//! teardown are aggregated into a single error.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use postgres::replication::ReplicationSlotNameError;

/// Result type used across the pipeline.
pub type ReplicantResult<T> = Result<T, ReplicantError>;

/// Payload stored for single [`ReplicantError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the pipeline.
#[derive(Debug, Clone)]
pub struct ReplicantError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors of several workers collected during teardown.
    Many {
        errors: Vec<ReplicantError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures raised by the pipeline.
///
/// Kinds are grouped by the component that raises them.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source connection
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceReadFailed,
    StatusUpdateFailed,
    AuthenticationError,
    EncryptionError,

    // Replication slot lifecycle
    ReplicationSlotNotCreated,
    ReplicationSlotNotFound,
    ReplicationSlotAlreadyExists,
    ReplicationSlotDropFailed,
    InvalidPosition,
    ReplicationStartFailed,

    // Decoding and filtering
    DecodingFailed,
    MissingTableMapping,

    // Sinks
    SinkEncodingFailed,
    SinkTransportFailed,
    SinkRemoteRejected,
    SinkIoFailed,

    // Configuration, IO and serialization
    ConfigError,
    IoError,
    SerializationError,
    DeserializationError,

    // Workers and state
    InvalidState,
    ConsumeWorkerPanic,
    HeartbeatWorkerPanic,
    FilterWorkerPanic,
    FanoutWorkerPanic,
    WorkerCancelled,

    Unknown,
}

impl ReplicantError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// Aggregated errors report the kind of their first error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for single errors.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the callsite where this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the originating error. Has no effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        ReplicantError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        ReplicantError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for ReplicantError {
    fn eq(&self, other: &ReplicantError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ReplicantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write_indented(f, "Detail", detail)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_indented(f, "Backtrace", &backtrace)?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} errors aggregated @ {}:{}:{}",
                    errors.len(),
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

fn write_indented(f: &mut fmt::Formatter<'_>, label: &str, text: &str) -> fmt::Result {
    write!(f, "\n  {label}:")?;
    for line in text.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for ReplicantError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for ReplicantError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ReplicantError {
        ReplicantError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for ReplicantError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ReplicantError {
        ReplicantError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for ReplicantError
where
    E: Into<ReplicantError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> ReplicantError {
        let location = Location::caller();
        let mut errors: Vec<ReplicantError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        ReplicantError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for ReplicantError {
    #[track_caller]
    fn from(err: std::io::Error) -> ReplicantError {
        ReplicantError::from_source(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<serde_json::Error> for ReplicantError {
    #[track_caller]
    fn from(err: serde_json::Error) -> ReplicantError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        ReplicantError::from_source(kind, description, err)
    }
}

/// Maps Postgres SQLSTATE codes to the kinds the replication session cares about.
impl From<tokio_postgres::Error> for ReplicantError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> ReplicantError {
        use tokio_postgres::error::SqlState;

        let (kind, description) = match err.code() {
            Some(sqlstate) => match *sqlstate {
                SqlState::CONNECTION_EXCEPTION
                | SqlState::CONNECTION_DOES_NOT_EXIST
                | SqlState::CONNECTION_FAILURE
                | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
                | SqlState::TOO_MANY_CONNECTIONS
                | SqlState::CANNOT_CONNECT_NOW
                | SqlState::ADMIN_SHUTDOWN
                | SqlState::CRASH_SHUTDOWN => (
                    ErrorKind::SourceConnectionFailed,
                    "PostgreSQL connection failed",
                ),
                SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                    ErrorKind::AuthenticationError,
                    "PostgreSQL authentication failed",
                ),
                SqlState::DUPLICATE_OBJECT => (
                    ErrorKind::ReplicationSlotAlreadyExists,
                    "Replication slot already exists",
                ),
                SqlState::UNDEFINED_OBJECT => (
                    ErrorKind::ReplicationSlotNotFound,
                    "Replication slot not found",
                ),
                SqlState::OBJECT_IN_USE | SqlState::OBJECT_NOT_IN_PREREQUISITE_STATE => {
                    (ErrorKind::InvalidState, "PostgreSQL object in use")
                }
                SqlState::CONFIGURATION_LIMIT_EXCEEDED => (
                    ErrorKind::ReplicationSlotNotCreated,
                    "PostgreSQL replication slot limit exceeded",
                ),
                _ => (ErrorKind::SourceQueryFailed, "PostgreSQL query failed"),
            },
            // No SQL state means the failure happened on the connection itself.
            None => (
                ErrorKind::SourceConnectionFailed,
                "PostgreSQL connection failed",
            ),
        };

        ReplicantError::from_source(kind, description, err)
    }
}

impl From<reqwest::Error> for ReplicantError {
    #[track_caller]
    fn from(err: reqwest::Error) -> ReplicantError {
        let (kind, description) = if err.is_decode() || err.is_body() {
            (ErrorKind::SinkIoFailed, "HTTP response body could not be read")
        } else if err.is_builder() {
            (ErrorKind::ConfigError, "HTTP client configuration failed")
        } else {
            (ErrorKind::SinkTransportFailed, "HTTP request could not be sent")
        };

        ReplicantError::from_source(kind, description, err)
    }
}

impl From<rustls::Error> for ReplicantError {
    #[track_caller]
    fn from(err: rustls::Error) -> ReplicantError {
        ReplicantError::from_source(ErrorKind::EncryptionError, "TLS configuration failed", err)
    }
}

impl From<ReplicationSlotNameError> for ReplicantError {
    #[track_caller]
    fn from(err: ReplicationSlotNameError) -> ReplicantError {
        ReplicantError::from_source(ErrorKind::ConfigError, "Replication slot name is invalid", err)
    }
}
