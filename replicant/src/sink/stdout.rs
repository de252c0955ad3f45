use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::error::{ErrorKind, ReplicantResult};
use crate::replicant_error;
use crate::sink::Sink;
use crate::types::ChangeRecord;

/// Writes one human-readable line per record.
#[derive(Debug)]
pub struct StdoutSink<W = Stdout> {
    writer: Mutex<W>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::with_writer(tokio::io::stdout())
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> StdoutSink<W> {
    /// Writes to `writer` instead of the process standard output.
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Sink for StdoutSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        "stdout"
    }

    async fn write(&self, record: &ChangeRecord) -> ReplicantResult<()> {
        let line = format!("{record}\n");

        let mut writer = self.writer.lock().await;
        let result = match writer.write_all(line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(err) => Err(err),
        };

        result.map_err(|err| {
            replicant_error!(
                ErrorKind::SinkIoFailed,
                "Can't write to standard output",
                detail = err.to_string(),
                source: err
            )
        })
    }
}
