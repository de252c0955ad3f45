use std::future::Future;
use std::pin::Pin;

use config::shared::PgConnectionConfig;
use futures::StreamExt;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, ReplicantResult};
use crate::replication::client::PgReplicationClient;
use crate::replication::stream::WalStream;
use crate::types::{Position, ReplicationMessage};

/// A replication connection to the source database.
///
/// The session is owned by a single task. [`ReplicationSession::wait_for_message`] must be cancel
/// safe since it is raced against other events.
pub trait ReplicationSession: Send + 'static {
    /// Returns whether the slot exists on the server.
    fn slot_exists(&mut self, slot_name: &str)
    -> impl Future<Output = ReplicantResult<bool>> + Send;

    /// Creates a logical slot and returns the server reported starting position, unparsed.
    fn create_slot(
        &mut self,
        slot_name: &str,
        output_plugin: &str,
    ) -> impl Future<Output = ReplicantResult<String>> + Send;

    /// Drops the slot. Works while the session is streaming from that slot.
    fn drop_slot(&mut self, slot_name: &str) -> impl Future<Output = ReplicantResult<()>> + Send;

    /// Starts streaming changes of the slot from `start`.
    fn start_streaming(
        &mut self,
        slot_name: &str,
        start: Position,
    ) -> impl Future<Output = ReplicantResult<()>> + Send;

    /// Waits for the next message. Returns `None` once the server ended the stream.
    fn wait_for_message(
        &mut self,
    ) -> impl Future<Output = ReplicantResult<Option<ReplicationMessage>>> + Send;

    /// Acknowledges every change up to `position`.
    fn acknowledge(&mut self, position: Position)
    -> impl Future<Output = ReplicantResult<()>> + Send;

    /// Closes the connection. The session can still drop slots afterwards.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// [`ReplicationSession`] backed by a Postgres replication connection.
pub struct PgReplicationSession {
    config: PgConnectionConfig,
    client: Option<PgReplicationClient>,
    stream: Option<Pin<Box<WalStream>>>,
}

impl PgReplicationSession {
    pub async fn connect(config: PgConnectionConfig) -> ReplicantResult<Self> {
        let client = PgReplicationClient::connect(&config).await?;

        Ok(Self {
            config,
            client: Some(client),
            stream: None,
        })
    }

    fn client(&self) -> ReplicantResult<&PgReplicationClient> {
        match &self.client {
            Some(client) => Ok(client),
            None => bail!(
                ErrorKind::InvalidState,
                "Replication session is closed",
                "The replication connection was closed before the command was issued"
            ),
        }
    }

    fn stream(&mut self) -> ReplicantResult<Pin<&mut WalStream>> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.as_mut()),
            None => bail!(
                ErrorKind::InvalidState,
                "Replication session is not streaming",
                "Streaming must be started before messages are read or acknowledged"
            ),
        }
    }
}

impl ReplicationSession for PgReplicationSession {
    async fn slot_exists(&mut self, slot_name: &str) -> ReplicantResult<bool> {
        self.client()?.slot_exists(slot_name).await
    }

    async fn create_slot(&mut self, slot_name: &str, output_plugin: &str) -> ReplicantResult<String> {
        self.client()?.create_slot(slot_name, output_plugin).await
    }

    async fn drop_slot(&mut self, slot_name: &str) -> ReplicantResult<()> {
        // A slot can't be dropped while a connection streams from it, so the streaming
        // connection is closed and a fresh one issues the drop.
        if self.stream.is_some() || self.client.is_none() {
            self.stream = None;
            self.client = None;

            info!("reconnecting to drop replication slot '{}'", slot_name);
            self.client = Some(PgReplicationClient::connect(&self.config).await?);
        }

        self.client()?.delete_slot(slot_name).await
    }

    async fn start_streaming(&mut self, slot_name: &str, start: Position) -> ReplicantResult<()> {
        let stream = self.client()?.start_replication(slot_name, start).await?;
        self.stream = Some(Box::pin(stream));

        Ok(())
    }

    async fn wait_for_message(&mut self) -> ReplicantResult<Option<ReplicationMessage>> {
        self.stream()?.next().await.transpose()
    }

    async fn acknowledge(&mut self, position: Position) -> ReplicantResult<()> {
        self.stream()?.send_status_update(position).await
    }

    async fn close(&mut self) {
        self.stream = None;
        if self.client.take().is_some() {
            info!("replication connection closed");
        }
    }
}
