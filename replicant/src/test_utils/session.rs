use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::bail;
use crate::error::{ErrorKind, ReplicantError, ReplicantResult};
use crate::replication::ReplicationSession;
use crate::test_utils::notify::TimedNotify;
use crate::types::{Position, ReplicationMessage};

/// Starting position reported for new slots unless overridden.
pub const DEFAULT_START_POSITION: &str = "0/16B3748";

type ScriptedMessage = ReplicantResult<ReplicationMessage>;

#[derive(Debug)]
struct Inner {
    slots: BTreeSet<String>,
    created_slots: Vec<String>,
    dropped_slots: Vec<String>,
    streaming: Option<(String, Position)>,
    acknowledged: Vec<Position>,
    closed: bool,
    start_position: String,
    fail_slot_exists: bool,
    fail_create_slot: bool,
    fail_drop_slot: bool,
    fail_start_streaming: bool,
    failing_acknowledgements: usize,
    acknowledge_attempts: usize,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            slots: BTreeSet::new(),
            created_slots: Vec::new(),
            dropped_slots: Vec::new(),
            streaming: None,
            acknowledged: Vec::new(),
            closed: false,
            start_position: DEFAULT_START_POSITION.to_string(),
            fail_slot_exists: false,
            fail_create_slot: false,
            fail_drop_slot: false,
            fail_start_streaming: false,
            failing_acknowledgements: 0,
            acknowledge_attempts: 0,
        }
    }
}

fn injected(kind: ErrorKind, operation: &'static str) -> ReplicantError {
    crate::replicant_error!(kind, operation, "Injected failure")
}

/// [`ReplicationSession`] fed by a [`MemorySessionControl`].
#[derive(Debug)]
pub struct MemorySession {
    inner: Arc<Mutex<Inner>>,
    messages: mpsc::UnboundedReceiver<ScriptedMessage>,
    changed: TimedNotify,
}

/// Test side of a [`MemorySession`]: scripts messages and inspects what the session received.
#[derive(Debug, Clone)]
pub struct MemorySessionControl {
    inner: Arc<Mutex<Inner>>,
    messages: Arc<Mutex<Option<mpsc::UnboundedSender<ScriptedMessage>>>>,
    changed: TimedNotify,
}

/// Creates a connected session and control pair.
pub fn memory_session() -> (MemorySession, MemorySessionControl) {
    let inner = Arc::new(Mutex::new(Inner::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    let changed = TimedNotify::default();

    let session = MemorySession {
        inner: inner.clone(),
        messages: rx,
        changed: changed.clone(),
    };
    let control = MemorySessionControl {
        inner,
        messages: Arc::new(Mutex::new(Some(tx))),
        changed,
    };

    (session, control)
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySession {
    fn update<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let result = f(&mut lock(&self.inner));
        self.changed.notify();
        result
    }
}

impl ReplicationSession for MemorySession {
    async fn slot_exists(&mut self, slot_name: &str) -> ReplicantResult<bool> {
        let inner = lock(&self.inner);
        if inner.fail_slot_exists {
            return Err(injected(ErrorKind::SourceQueryFailed, "Slot lookup failed"));
        }

        Ok(inner.slots.contains(slot_name))
    }

    async fn create_slot(&mut self, slot_name: &str, _output_plugin: &str) -> ReplicantResult<String> {
        self.update(|inner| {
            if inner.fail_create_slot {
                return Err(injected(
                    ErrorKind::ReplicationSlotNotCreated,
                    "Slot creation failed",
                ));
            }

            if !inner.slots.insert(slot_name.to_string()) {
                bail!(
                    ErrorKind::ReplicationSlotAlreadyExists,
                    "Replication slot already exists",
                    format!("The slot '{slot_name}' already exists")
                );
            }
            inner.created_slots.push(slot_name.to_string());

            Ok(inner.start_position.clone())
        })
    }

    async fn drop_slot(&mut self, slot_name: &str) -> ReplicantResult<()> {
        self.update(|inner| {
            if inner.fail_drop_slot {
                return Err(injected(
                    ErrorKind::ReplicationSlotDropFailed,
                    "Slot drop failed",
                ));
            }

            if !inner.slots.remove(slot_name) {
                bail!(
                    ErrorKind::ReplicationSlotNotFound,
                    "Replication slot not found",
                    format!("The slot '{slot_name}' does not exist")
                );
            }
            if inner
                .streaming
                .as_ref()
                .is_some_and(|(name, _)| name == slot_name)
            {
                inner.streaming = None;
            }
            inner.dropped_slots.push(slot_name.to_string());

            Ok(())
        })
    }

    async fn start_streaming(&mut self, slot_name: &str, start: Position) -> ReplicantResult<()> {
        self.update(|inner| {
            if inner.fail_start_streaming {
                return Err(injected(
                    ErrorKind::ReplicationStartFailed,
                    "Streaming failed to start",
                ));
            }

            if !inner.slots.contains(slot_name) {
                bail!(
                    ErrorKind::ReplicationSlotNotFound,
                    "Replication slot not found",
                    format!("The slot '{slot_name}' does not exist")
                );
            }
            inner.streaming = Some((slot_name.to_string(), start));

            Ok(())
        })
    }

    async fn wait_for_message(&mut self) -> ReplicantResult<Option<ReplicationMessage>> {
        if lock(&self.inner).streaming.is_none() {
            bail!(
                ErrorKind::InvalidState,
                "Replication session is not streaming",
                "Streaming must be started before messages are read"
            );
        }

        self.messages.recv().await.transpose()
    }

    async fn acknowledge(&mut self, position: Position) -> ReplicantResult<()> {
        self.update(|inner| {
            inner.acknowledge_attempts += 1;
            if inner.failing_acknowledgements > 0 {
                inner.failing_acknowledgements -= 1;
                return Err(injected(ErrorKind::StatusUpdateFailed, "Status update failed"));
            }
            inner.acknowledged.push(position);

            Ok(())
        })
    }

    async fn close(&mut self) {
        self.update(|inner| {
            inner.streaming = None;
            inner.closed = true;
        });
    }
}

impl MemorySessionControl {
    fn send(&self, message: ScriptedMessage) {
        if let Some(tx) = lock_sender(&self.messages).as_ref() {
            // The session may already be gone, in which case the message is irrelevant.
            let _ = tx.send(message);
        }
    }

    pub fn send_change(&self, wal_end: u64, data: Bytes) {
        self.send(Ok(ReplicationMessage::ChangeData {
            wal_start: Position::new(wal_end),
            wal_end: Position::new(wal_end),
            data,
        }));
    }

    pub fn send_keepalive(&self, wal_end: u64, reply_requested: bool) {
        self.send(Ok(ReplicationMessage::Keepalive {
            wal_end: Position::new(wal_end),
            reply_requested,
        }));
    }

    /// Makes the next read fail with `kind`.
    pub fn send_read_error(&self, kind: ErrorKind) {
        self.send(Err(injected(kind, "Replication read failed")));
    }

    /// Ends the stream once the queued messages were read.
    pub fn end_stream(&self) {
        lock_sender(&self.messages).take();
    }

    pub fn add_existing_slot(&self, slot_name: &str) {
        lock(&self.inner).slots.insert(slot_name.to_string());
    }

    pub fn set_start_position(&self, position: &str) {
        lock(&self.inner).start_position = position.to_string();
    }

    pub fn fail_slot_exists(&self) {
        lock(&self.inner).fail_slot_exists = true;
    }

    pub fn fail_create_slot(&self) {
        lock(&self.inner).fail_create_slot = true;
    }

    pub fn fail_drop_slot(&self) {
        lock(&self.inner).fail_drop_slot = true;
    }

    pub fn fail_start_streaming(&self) {
        lock(&self.inner).fail_start_streaming = true;
    }

    /// Makes the next acknowledgement fail. Later ones succeed again.
    pub fn fail_acknowledge(&self) {
        lock(&self.inner).failing_acknowledgements += 1;
    }

    pub fn slots(&self) -> Vec<String> {
        lock(&self.inner).slots.iter().cloned().collect()
    }

    pub fn created_slots(&self) -> Vec<String> {
        lock(&self.inner).created_slots.clone()
    }

    pub fn dropped_slots(&self) -> Vec<String> {
        lock(&self.inner).dropped_slots.clone()
    }

    pub fn streaming(&self) -> Option<(String, Position)> {
        lock(&self.inner).streaming.clone()
    }

    pub fn acknowledged(&self) -> Vec<Position> {
        lock(&self.inner).acknowledged.clone()
    }

    /// Counts acknowledgements sent, including failed ones.
    pub fn acknowledge_attempts(&self) -> usize {
        lock(&self.inner).acknowledge_attempts
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Waits until at least `count` acknowledgements were sent.
    pub async fn wait_for_acknowledgements(&self, count: usize) {
        self.changed
            .wait_until(|| lock(&self.inner).acknowledged.len() >= count)
            .await;
    }

    pub async fn wait_for_acknowledge_attempts(&self, count: usize) {
        self.changed
            .wait_until(|| lock(&self.inner).acknowledge_attempts >= count)
            .await;
    }

    pub async fn wait_for_close(&self) {
        self.changed.wait_until(|| lock(&self.inner).closed).await;
    }
}

fn lock_sender(
    sender: &Mutex<Option<mpsc::UnboundedSender<ScriptedMessage>>>,
) -> MutexGuard<'_, Option<mpsc::UnboundedSender<ScriptedMessage>>> {
    sender.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
