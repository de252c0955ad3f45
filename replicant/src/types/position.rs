use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_postgres::types::PgLsn;

use crate::error::{ErrorKind, ReplicantError};
use crate::replicant_error;

/// A position in the server's write-ahead log.
///
/// Textual form is the Postgres `X/Y` notation, where both halves are hexadecimal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(u64);

impl Position {
    pub const ZERO: Position = Position(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl From<u64> for Position {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<PgLsn> for Position {
    fn from(lsn: PgLsn) -> Self {
        Self(u64::from(lsn))
    }
}

impl From<Position> for PgLsn {
    fn from(position: Position) -> Self {
        PgLsn::from(position.0)
    }
}

impl FromStr for Position {
    type Err = ReplicantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<PgLsn>().map(Position::from).map_err(|_| {
            replicant_error!(
                ErrorKind::InvalidPosition,
                "Invalid log position",
                detail = format!("`{s}` is not a valid `X/Y` log position")
            )
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

/// Shared, monotonically increasing acknowledged position.
///
/// Written by the pipeline and the consume loop, read by the heartbeat loop.
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    inner: Arc<AtomicU64>,
}

impl PositionTracker {
    pub fn new(position: Position) -> Self {
        Self {
            inner: Arc::new(AtomicU64::new(position.into_inner())),
        }
    }

    pub fn get(&self) -> Position {
        Position(self.inner.load(Ordering::Acquire))
    }

    /// Moves the position forward to `position`. Smaller values are ignored.
    ///
    /// Returns the position held after the call.
    pub fn advance(&self, position: Position) -> Position {
        let previous = self.inner.fetch_max(position.into_inner(), Ordering::AcqRel);
        Position(previous.max(position.into_inner()))
    }
}
