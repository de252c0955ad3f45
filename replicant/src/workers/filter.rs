use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info};

use crate::bail;
use crate::error::{ErrorKind, ReplicantResult};
use crate::filter::FilterStage;
use crate::types::{ChangeBatch, ChangeRecord};
use crate::workers::base::{WorkerType, join_worker};

#[derive(Debug)]
pub struct FilterWorkerHandle {
    handle: JoinHandle<ReplicantResult<()>>,
}

impl FilterWorkerHandle {
    pub async fn wait(self) -> ReplicantResult<()> {
        join_worker(WorkerType::Filter, self.handle).await?
    }
}

/// Runs the filter stage over every batch of its queue.
///
/// The worker stops once the consume worker dropped the sending side and the queue is drained.
#[derive(Debug)]
pub struct FilterWorker {
    stage: FilterStage,
    batch_rx: mpsc::Receiver<ChangeBatch>,
    record_tx: mpsc::Sender<ChangeRecord>,
}

impl FilterWorker {
    pub fn new(
        stage: FilterStage,
        batch_rx: mpsc::Receiver<ChangeBatch>,
        record_tx: mpsc::Sender<ChangeRecord>,
    ) -> Self {
        Self {
            stage,
            batch_rx,
            record_tx,
        }
    }

    pub fn spawn(self) -> FilterWorkerHandle {
        let span = tracing::info_span!("filter_worker");
        let handle = tokio::spawn(self.run().instrument(span.or_current()));

        FilterWorkerHandle { handle }
    }

    async fn run(mut self) -> ReplicantResult<()> {
        info!("starting filter worker");

        while let Some(batch) = self.batch_rx.recv().await {
            let received = batch.len();
            let forwarded = self.stage.filter_batch(batch);

            debug!(received, forwarded = forwarded.len(), "batch filtered");

            for record in forwarded {
                if self.record_tx.send(record).await.is_err() {
                    bail!(
                        ErrorKind::InvalidState,
                        "Fanout stage stopped",
                        "The fanout worker stopped before the filter queue was drained"
                    );
                }
            }
        }

        info!("filter queue closed, stopping filter worker");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{AllowList, TableMapping};
    use crate::test_utils::record::record;
    use crate::types::TableName;

    #[tokio::test]
    async fn forwards_filtered_records_in_order() {
        let mapping: TableMapping = [
            (
                TableName::new("sales", "orders_2024"),
                TableName::new("sales", "orders"),
            ),
            (
                TableName::new("public", "users"),
                TableName::new("public", "users"),
            ),
        ]
        .into_iter()
        .collect();
        let allow_list = AllowList::new([TableName::new("sales", "orders")]);

        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (record_tx, mut record_rx) = mpsc::channel(4);
        let handle =
            FilterWorker::new(FilterStage::new(mapping, Some(allow_list)), batch_rx, record_tx)
                .spawn();

        batch_tx
            .send(vec![
                record("sales", "orders_2024", 1),
                record("public", "users", 2),
                record("sales", "orders_2024", 3),
            ])
            .await
            .unwrap();
        drop(batch_tx);

        assert_eq!(record_rx.recv().await, Some(record("sales", "orders", 1)));
        assert_eq!(record_rx.recv().await, Some(record("sales", "orders", 3)));
        assert_eq!(record_rx.recv().await, None);

        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn fails_when_fanout_is_gone() {
        let mapping: TableMapping = [(
            TableName::new("public", "users"),
            TableName::new("public", "users"),
        )]
        .into_iter()
        .collect();

        let (batch_tx, batch_rx) = mpsc::channel(1);
        let (record_tx, record_rx) = mpsc::channel(1);
        drop(record_rx);

        let handle = FilterWorker::new(FilterStage::new(mapping, None), batch_rx, record_tx).spawn();
        batch_tx.send(vec![record("public", "users", 1)]).await.unwrap();

        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
