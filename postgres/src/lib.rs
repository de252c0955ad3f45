//! Postgres naming and replication helpers shared across the workspace.

pub mod replication;
pub mod time;
pub mod types;
