use postgres::replication::ReplicationSlotNameError;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The replication slot name is not accepted by Postgres.
    #[error("Invalid `slot_name`: {0}")]
    InvalidSlotName(#[from] ReplicationSlotNameError),
    /// The output plugin name is empty.
    #[error("`output_plugin` cannot be empty")]
    OutputPluginEmpty,
    /// The heartbeat interval cannot be zero.
    #[error("`heartbeat_interval_ms` cannot be zero")]
    HeartbeatIntervalZero,
    /// A stage queue cannot have zero capacity.
    #[error("`{0}` cannot be zero")]
    QueueSizeZero(&'static str),
    /// The HTTP sink is enabled but has no destination URL.
    #[error("Invalid http sink config: `url` must be set when `enabled` is true")]
    MissingHttpUrl,
    /// The HTTP sink request timeout cannot be zero.
    #[error("Invalid http sink config: `timeout_ms` cannot be zero")]
    HttpTimeoutZero,
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
}
