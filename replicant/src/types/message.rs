use bytes::Bytes;

use crate::types::Position;

/// A message received from the replication stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationMessage {
    /// A payload produced by the decoding plugin.
    ChangeData {
        wal_start: Position,
        wal_end: Position,
        data: Bytes,
    },
    /// A keepalive sent by the server.
    Keepalive {
        wal_end: Position,
        /// When set the server disconnects unless a status update arrives soon.
        reply_requested: bool,
    },
}
