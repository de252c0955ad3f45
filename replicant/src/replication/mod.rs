//! Access to the source database's logical replication.

mod client;
mod session;
mod stream;

pub use client::{PgReplicationClient, TableMappingEntry};
pub use session::{PgReplicationSession, ReplicationSession};
pub use stream::WalStream;
