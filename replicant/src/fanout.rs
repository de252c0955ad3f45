//! Delivery of forwarded records to every configured sink.

use tracing::{debug, error, info, warn};

use crate::sink::Sink;
use crate::types::ChangeRecord;

/// Owns the sink set and writes each record to every sink in configuration order.
///
/// A failing sink never prevents the remaining sinks from receiving the record, and failures are
/// never returned to the caller.
pub struct Fanout {
    sinks: Vec<Box<dyn Sink>>,
}

impl Fanout {
    /// Calls `init` on every sink once.
    ///
    /// A sink whose initialization failed is logged and kept in the set. Its writes will be
    /// attempted like any other sink.
    pub async fn initialize(sinks: Vec<Box<dyn Sink>>) -> Self {
        for sink in &sinks {
            match sink.init().await {
                Ok(()) => info!(sink = sink.name(), "sink initialized"),
                Err(err) => warn!(
                    sink = sink.name(),
                    "sink initialization failed, writes will still be attempted: {}", err
                ),
            }
        }

        if sinks.is_empty() {
            warn!("no sinks are enabled, forwarded records will be discarded");
        }

        Self { sinks }
    }

    /// Writes `record` to every sink and returns how many writes failed.
    pub async fn deliver(&self, record: &ChangeRecord) -> usize {
        let mut failures = 0;

        for sink in &self.sinks {
            if let Err(err) = sink.write(record).await {
                failures += 1;
                error!(
                    sink = sink.name(),
                    table = %record.table_name(),
                    "failed to write record to sink: {}", err
                );
            }
        }

        debug!(
            table = %record.table_name(),
            sinks = self.sinks.len(),
            failures,
            "record delivered"
        );

        failures
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|sink| sink.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("sinks", &self.sink_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sink::memory::MemorySink;
    use crate::test_utils::record::record;
    use crate::test_utils::sink::FailingSink;

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let first = MemorySink::with_name("first");
        let last = MemorySink::with_name("last");
        let failing = FailingSink::new(ErrorKind::SinkRemoteRejected);

        let fanout = Fanout::initialize(vec![
            Box::new(first.clone()),
            Box::new(failing.clone()),
            Box::new(last.clone()),
        ])
        .await;

        let one = record("public", "users", 1);
        let two = record("public", "users", 2);

        assert_eq!(fanout.deliver(&one).await, 1);
        assert_eq!(fanout.deliver(&two).await, 1);

        assert_eq!(first.records().await, vec![one.clone(), two.clone()]);
        assert_eq!(last.records().await, vec![one, two]);
        assert_eq!(failing.write_attempts(), 2);
    }

    #[tokio::test]
    async fn failed_init_keeps_sink_in_set() {
        let failing = FailingSink::failing_init(ErrorKind::SinkTransportFailed);
        let memory = MemorySink::new();

        let fanout =
            Fanout::initialize(vec![Box::new(failing.clone()), Box::new(memory.clone())]).await;

        assert_eq!(fanout.len(), 2);
        assert_eq!(memory.init_calls().await, 1);

        fanout.deliver(&record("public", "users", 1)).await;

        assert_eq!(failing.write_attempts(), 1);
        assert_eq!(memory.records().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_fanout_discards_records() {
        let fanout = Fanout::initialize(Vec::new()).await;

        assert!(fanout.is_empty());
        assert_eq!(fanout.deliver(&record("public", "users", 1)).await, 0);
    }
}
