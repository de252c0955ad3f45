//! In-memory collaborators for testing pipelines without a database.
//!
//! - [`session`] scripts the replication stream and records slot commands and acknowledgements.
//! - [`catalog`] serves a fixed table mapping.
//! - [`sink`] provides a sink that always fails.
//! - [`record`] builds change records and `wal2json` payloads.
//! - [`notify`] waits for conditions with a timeout so tests fail instead of hanging.

pub mod catalog;
pub mod notify;
pub mod pipeline;
pub mod record;
pub mod session;
pub mod sink;
