use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx};
use crate::decoding::DecodeFn;
use crate::decoding::wal2json::payload_snippet;
use crate::error::{ErrorKind, ReplicantResult};
use crate::replication::ReplicationSession;
use crate::types::{ChangeBatch, Position, PositionTracker, ReplicationMessage};
use crate::workers::base::{WorkerType, join_worker};

/// Bytes of an undecodable payload included in the log line.
const MAX_PAYLOAD_SNIPPET_LEN: usize = 256;

/// What the consume worker hands back once it stopped.
///
/// The session is returned on every path so the pipeline can still drop the slot.
#[derive(Debug)]
pub struct ConsumeExit<S> {
    pub session: S,
    pub result: ReplicantResult<()>,
}

#[derive(Debug)]
pub struct ConsumeWorkerHandle<S> {
    handle: JoinHandle<ConsumeExit<S>>,
}

impl<S> ConsumeWorkerHandle<S> {
    /// Waits for the worker to stop.
    ///
    /// Fails only when the worker panicked or was cancelled, in which case the session is lost.
    pub async fn wait(self) -> ReplicantResult<ConsumeExit<S>> {
        join_worker(WorkerType::Consume, self.handle).await
    }
}

/// Reads the replication stream and forwards decoded batches to the filter stage.
///
/// The worker is the only user of the session. Acknowledgements requested by the heartbeat worker
/// arrive through `ack_rx` and are sent between two reads, always with the position tracked at
/// that moment so the acknowledged position never moves backwards.
pub struct ConsumeWorker<S> {
    slot_name: String,
    session: S,
    decode: DecodeFn,
    tracker: PositionTracker,
    acknowledge_received: bool,
    filter_tx: mpsc::Sender<ChangeBatch>,
    ack_rx: mpsc::Receiver<()>,
    shutdown_tx: ShutdownTx,
    shutdown_rx: ShutdownRx,
}

/// Whether the loop keeps reading after a message was handled.
enum Flow {
    Continue,
    Stop,
}

impl<S> ConsumeWorker<S>
where
    S: ReplicationSession,
{
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        slot_name: String,
        session: S,
        decode: DecodeFn,
        tracker: PositionTracker,
        acknowledge_received: bool,
        filter_tx: mpsc::Sender<ChangeBatch>,
        ack_rx: mpsc::Receiver<()>,
        shutdown_tx: ShutdownTx,
    ) -> Self {
        let shutdown_rx = shutdown_tx.subscribe();

        Self {
            slot_name,
            session,
            decode,
            tracker,
            acknowledge_received,
            filter_tx,
            ack_rx,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn spawn(self) -> ConsumeWorkerHandle<S> {
        let span = tracing::info_span!("consume_worker", slot_name = %self.slot_name);
        let handle = tokio::spawn(self.run().instrument(span.or_current()));

        ConsumeWorkerHandle { handle }
    }

    async fn run(mut self) -> ConsumeExit<S> {
        info!("starting consume worker");

        let result = self.consume().await;
        match &result {
            Ok(()) => info!("consume worker stopped"),
            Err(err) => {
                error!("consume worker failed, shutting down the pipeline: {}", err);
                // The heartbeat worker and the pipeline owner must stop too.
                self.shutdown_tx.shutdown();
            }
        }

        // Dropping the sender lets the filter worker drain its queue and stop.
        ConsumeExit {
            session: self.session,
            result,
        }
    }

    async fn consume(&mut self) -> ReplicantResult<()> {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.wait_for_shutdown() => {
                    info!("shutdown signal received, stopping the replication read loop");
                    return Ok(());
                }

                Some(()) = self.ack_rx.recv() => {
                    self.acknowledge(self.tracker.get()).await;
                }

                message = self.session.wait_for_message() => {
                    let Some(message) = message? else {
                        bail!(
                            ErrorKind::SourceReadFailed,
                            "Replication stream ended",
                            "The source closed the replication stream"
                        );
                    };

                    if let Flow::Stop = self.handle_message(message).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn handle_message(&mut self, message: ReplicationMessage) -> ReplicantResult<Flow> {
        match message {
            ReplicationMessage::Keepalive {
                wal_end,
                reply_requested,
            } => {
                debug!(%wal_end, reply_requested, "keepalive received");

                if reply_requested {
                    self.acknowledge(self.tracker.get()).await;
                }

                Ok(Flow::Continue)
            }
            ReplicationMessage::ChangeData { wal_end, data, .. } => {
                let batch = match (self.decode)(&data) {
                    Ok(batch) => batch,
                    Err(err) => {
                        error!(
                            %wal_end,
                            payload = %payload_snippet(&data, MAX_PAYLOAD_SNIPPET_LEN),
                            "skipping message that could not be decoded: {}", err
                        );

                        return Ok(Flow::Continue);
                    }
                };

                if batch.is_empty() {
                    return Ok(Flow::Continue);
                }

                debug!(%wal_end, records = batch.len(), "forwarding batch to filter stage");

                // Blocks while the filter queue is full, which slows down reading from the source.
                tokio::select! {
                    biased;

                    _ = self.shutdown_rx.wait_for_shutdown() => {
                        info!("shutdown signal received while forwarding a batch");
                        return Ok(Flow::Stop);
                    }

                    sent = self.filter_tx.send(batch) => {
                        if sent.is_err() {
                            bail!(
                                ErrorKind::InvalidState,
                                "Filter stage stopped",
                                "The filter worker stopped while the replication stream was active"
                            );
                        }
                    }
                }

                if self.acknowledge_received {
                    self.tracker.advance(wal_end);
                }

                Ok(Flow::Continue)
            }
        }
    }

    async fn acknowledge(&mut self, position: Position) {
        match self.session.acknowledge(position).await {
            Ok(()) => debug!(%position, "position acknowledged"),
            Err(err) => warn!(%position, "failed to acknowledge position: {}", err),
        }
    }
}
