use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::ReplicantResult;
use crate::types::PositionTracker;
use crate::workers::base::{WorkerType, join_worker};

#[derive(Debug)]
pub struct HeartbeatWorkerHandle {
    handle: JoinHandle<()>,
}

impl HeartbeatWorkerHandle {
    pub async fn wait(self) -> ReplicantResult<()> {
        join_worker(WorkerType::Heartbeat, self.handle).await
    }
}

/// Requests an acknowledgement of the tracked position on a fixed interval.
///
/// The first request is sent one full interval after the worker starts. Requests carry no
/// position, the consume worker reads the tracker when it sends the acknowledgement. A tick is
/// skipped when the previous request was not yet picked up.
#[derive(Debug)]
pub struct HeartbeatWorker {
    interval: Duration,
    tracker: PositionTracker,
    ack_tx: mpsc::Sender<()>,
    shutdown_rx: ShutdownRx,
}

impl HeartbeatWorker {
    pub fn new(
        interval: Duration,
        tracker: PositionTracker,
        ack_tx: mpsc::Sender<()>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            interval,
            tracker,
            ack_tx,
            shutdown_rx,
        }
    }

    pub fn spawn(self) -> HeartbeatWorkerHandle {
        let span = tracing::info_span!(
            "heartbeat_worker",
            interval_ms = self.interval.as_millis() as u64
        );
        let handle = tokio::spawn(self.run().instrument(span.or_current()));

        HeartbeatWorkerHandle { handle }
    }

    async fn run(mut self) {
        info!("starting heartbeat worker");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.wait_for_shutdown() => {
                    info!("shutdown signal received, stopping heartbeat worker");
                    return;
                }

                _ = ticker.tick() => {
                    let position = self.tracker.get();

                    match self.ack_tx.try_send(()) {
                        Ok(()) => debug!(%position, "heartbeat acknowledgement requested"),
                        Err(TrySendError::Full(_)) => {
                            debug!(%position, "previous heartbeat still pending, skipping tick");
                        }
                        Err(TrySendError::Closed(_)) => {
                            info!("consume worker stopped, stopping heartbeat worker");
                            return;
                        }
                    }
                }
            }
        }
    }
}
