use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::ReplicantResult;
use crate::sink::Sink;
use crate::types::ChangeRecord;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<ChangeRecord>,
    init_calls: usize,
}

/// Keeps every written record in memory. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    name: String,
    write_delay: Option<Duration>,
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_name("memory")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            write_delay: None,
            inner: Arc::default(),
        }
    }

    /// Sleeps for `delay` before storing each record, simulating a slow destination.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Returns a copy of the records written so far.
    pub async fn records(&self) -> Vec<ChangeRecord> {
        self.inner.lock().await.records.clone()
    }

    /// Returns how many times [`Sink::init`] was called.
    pub async fn init_calls(&self) -> usize {
        self.inner.lock().await.init_calls
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> ReplicantResult<()> {
        self.inner.lock().await.init_calls += 1;
        Ok(())
    }

    async fn write(&self, record: &ChangeRecord) -> ReplicantResult<()> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        self.inner.lock().await.records.push(record.clone());
        Ok(())
    }
}
