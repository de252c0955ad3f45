//! Configuration types shared between the daemon and the pipeline library.

mod base;
mod connection;
mod pipeline;
mod replicator;
mod sink;

pub use base::ValidationError;
pub use connection::{DefaultPgConnectionOptions, IntoConnectOptions, PgConnectionConfig, TlsConfig};
pub use pipeline::PipelineConfig;
pub use replicator::ReplicatorConfig;
pub use sink::{HttpSinkConfig, SinksConfig, StdoutSinkConfig};
