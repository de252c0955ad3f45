use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use postgres::time::micros_since_postgres_epoch;
use postgres_replication::ReplicationStream;
use postgres_replication::protocol::ReplicationMessage as PgReplicationMessage;
use tokio_postgres::CopyBothDuplex;
use tokio_postgres::types::PgLsn;
use tracing::debug;

use crate::error::{ErrorKind, ReplicantResult};
use crate::replicant_error;
use crate::types::{Position, ReplicationMessage};

pin_project! {
    /// Raw logical replication stream of a slot.
    ///
    /// Payloads are handed out undecoded, so any text-based output plugin works.
    pub struct WalStream {
        #[pin]
        stream: ReplicationStream,
    }
}

impl WalStream {
    pub fn wrap(duplex: CopyBothDuplex<Bytes>) -> Self {
        Self {
            stream: ReplicationStream::new(duplex),
        }
    }

    /// Reports `position` as written, flushed and applied.
    pub async fn send_status_update(
        self: Pin<&mut Self>,
        position: Position,
    ) -> ReplicantResult<()> {
        let this = self.project();

        let lsn = PgLsn::from(position);
        let ts = micros_since_postgres_epoch(SystemTime::now());

        this.stream
            .standby_status_update(lsn, lsn, lsn, ts, 0)
            .await
            .map_err(|err| {
                replicant_error!(
                    ErrorKind::StatusUpdateFailed,
                    "Failed to send standby status update",
                    detail = format!("position {position}: {err}"),
                    source: err
                )
            })?;

        debug!(%position, "status update sent");

        Ok(())
    }
}

impl Stream for WalStream {
    type Item = ReplicantResult<ReplicationMessage>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.stream.poll_next(cx) {
            Poll::Ready(Some(Ok(PgReplicationMessage::XLogData(body)))) => {
                let wal_start = Position::new(body.wal_start());
                let wal_end = Position::new(body.wal_end());
                Poll::Ready(Some(Ok(ReplicationMessage::ChangeData {
                    wal_start,
                    wal_end,
                    data: body.into_data(),
                })))
            }
            Poll::Ready(Some(Ok(PgReplicationMessage::PrimaryKeepAlive(body)))) => {
                Poll::Ready(Some(Ok(ReplicationMessage::Keepalive {
                    wal_end: Position::new(body.wal_end()),
                    reply_requested: body.reply() == 1,
                })))
            }
            Poll::Ready(Some(Ok(_))) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(replicant_error!(
                ErrorKind::SourceReadFailed,
                "Failed to read from the replication stream",
                detail = err.to_string(),
                source: err
            )))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
