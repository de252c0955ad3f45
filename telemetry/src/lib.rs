//! Tracing setup shared by the replicator binary and the workspace tests.

pub mod tracing;
