use std::fmt;

use tokio::task::JoinHandle;

use crate::error::{ErrorKind, ReplicantResult};
use crate::replicant_error;

/// The tasks a pipeline runs while streaming.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerType {
    Consume,
    Heartbeat,
    Filter,
    Fanout,
}

impl WorkerType {
    fn panic_kind(self) -> ErrorKind {
        match self {
            WorkerType::Consume => ErrorKind::ConsumeWorkerPanic,
            WorkerType::Heartbeat => ErrorKind::HeartbeatWorkerPanic,
            WorkerType::Filter => ErrorKind::FilterWorkerPanic,
            WorkerType::Fanout => ErrorKind::FanoutWorkerPanic,
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerType::Consume => f.write_str("consume"),
            WorkerType::Heartbeat => f.write_str("heartbeat"),
            WorkerType::Filter => f.write_str("filter"),
            WorkerType::Fanout => f.write_str("fanout"),
        }
    }
}

/// Awaits a spawned worker, turning a panic or cancellation into an error of the worker's kind.
pub(crate) async fn join_worker<T>(
    worker_type: WorkerType,
    handle: JoinHandle<T>,
) -> ReplicantResult<T> {
    handle.await.map_err(|err| {
        if err.is_cancelled() {
            replicant_error!(
                ErrorKind::WorkerCancelled,
                "Worker was cancelled",
                format!("The {worker_type} worker was cancelled: {err}")
            )
        } else {
            replicant_error!(
                worker_type.panic_kind(),
                "Worker panicked",
                format!("The {worker_type} worker panicked: {err}")
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panic_is_mapped_to_worker_kind() {
        let handle = tokio::spawn(async { panic!("boom") });

        let err = join_worker::<()>(WorkerType::Filter, handle)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FilterWorkerPanic);
    }

    #[tokio::test]
    async fn abort_is_reported_as_cancellation() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();

        let err = join_worker(WorkerType::Heartbeat, handle)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WorkerCancelled);
    }

    #[tokio::test]
    async fn output_is_returned() {
        let handle = tokio::spawn(async { 42 });

        assert_eq!(join_worker(WorkerType::Consume, handle).await.unwrap(), 42);
    }
}
