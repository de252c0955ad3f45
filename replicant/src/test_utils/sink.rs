use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{ErrorKind, ReplicantResult};
use crate::sink::Sink;
use crate::types::ChangeRecord;
use crate::bail;

/// A sink whose writes always fail with the configured kind.
#[derive(Debug, Clone)]
pub struct FailingSink {
    kind: ErrorKind,
    fail_init: bool,
    write_attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            fail_init: false,
            write_attempts: Arc::default(),
        }
    }

    /// Also fails initialization.
    pub fn failing_init(kind: ErrorKind) -> Self {
        Self {
            fail_init: true,
            ..Self::new(kind)
        }
    }

    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn init(&self) -> ReplicantResult<()> {
        if self.fail_init {
            bail!(self.kind, "Sink initialization failed", "Injected failure");
        }

        Ok(())
    }

    async fn write(&self, _record: &ChangeRecord) -> ReplicantResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        bail!(self.kind, "Sink write failed", "Injected failure");
    }
}
