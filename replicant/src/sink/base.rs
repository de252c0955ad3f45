use async_trait::async_trait;
use config::shared::SinksConfig;
use tracing::info;

use crate::error::ReplicantResult;
use crate::sink::http::HttpSink;
use crate::sink::stdout::StdoutSink;
use crate::types::ChangeRecord;

/// A target receiving every forwarded change record.
///
/// Sinks are called from a single task, one record at a time, in the order records were read
/// from the replication stream.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name identifying the sink in logs.
    fn name(&self) -> &str;

    /// Prepares the sink. Called once before the first write.
    async fn init(&self) -> ReplicantResult<()> {
        Ok(())
    }

    /// Delivers one record.
    async fn write(&self, record: &ChangeRecord) -> ReplicantResult<()>;
}

/// Instantiates the enabled sinks. Stdout comes first, then http.
pub fn build_sinks(config: &SinksConfig) -> ReplicantResult<Vec<Box<dyn Sink>>> {
    let mut sinks: Vec<Box<dyn Sink>> = Vec::new();

    if config.stdout.enabled {
        sinks.push(Box::new(StdoutSink::new()));
    }

    if config.http.enabled {
        sinks.push(Box::new(HttpSink::from_config(&config.http)?));
    }

    info!(
        sinks = ?sinks.iter().map(|sink| sink.name()).collect::<Vec<_>>(),
        "sinks configured"
    );

    Ok(sinks)
}
