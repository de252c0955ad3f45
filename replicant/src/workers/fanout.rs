use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, info};

use crate::error::ReplicantResult;
use crate::fanout::Fanout;
use crate::types::ChangeRecord;
use crate::workers::base::{WorkerType, join_worker};

#[derive(Debug)]
pub struct FanoutWorkerHandle {
    handle: JoinHandle<()>,
}

impl FanoutWorkerHandle {
    pub async fn wait(self) -> ReplicantResult<()> {
        join_worker(WorkerType::Fanout, self.handle).await
    }
}

/// Delivers every record of its queue to the sinks, one record at a time.
#[derive(Debug)]
pub struct FanoutWorker {
    fanout: Fanout,
    record_rx: mpsc::Receiver<ChangeRecord>,
}

impl FanoutWorker {
    pub fn new(fanout: Fanout, record_rx: mpsc::Receiver<ChangeRecord>) -> Self {
        Self { fanout, record_rx }
    }

    pub fn spawn(self) -> FanoutWorkerHandle {
        let span = tracing::info_span!("fanout_worker", sinks = ?self.fanout.sink_names());
        let handle = tokio::spawn(self.run().instrument(span.or_current()));

        FanoutWorkerHandle { handle }
    }

    async fn run(mut self) {
        info!("starting fanout worker");

        let mut delivered = 0u64;
        while let Some(record) = self.record_rx.recv().await {
            self.fanout.deliver(&record).await;
            delivered += 1;
        }

        info!(delivered, "fanout queue closed, stopping fanout worker");
    }
}
