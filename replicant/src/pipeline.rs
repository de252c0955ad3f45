//! The orchestrator wiring the replication session, filter stage and fan-out together.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use config::shared::PipelineConfig;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{bail, replicant_error};
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::decoding::DecodeFn;
use crate::error::{ErrorKind, ReplicantError, ReplicantResult};
use crate::fanout::Fanout;
use crate::filter::FilterStage;
use crate::replication::ReplicationSession;
use crate::sink::Sink;
use crate::types::{Position, PositionTracker};
use crate::workers::consume::{ConsumeWorker, ConsumeWorkerHandle};
use crate::workers::fanout::{FanoutWorker, FanoutWorkerHandle};
use crate::workers::filter::{FilterWorker, FilterWorkerHandle};
use crate::workers::heartbeat::{HeartbeatWorker, HeartbeatWorkerHandle};

/// Capacity of the queue carrying heartbeat acknowledgement requests.
const ACK_QUEUE_SIZE: usize = 1;

fn validate_config(config: &PipelineConfig) -> ReplicantResult<()> {
    config.validate().map_err(|err| {
        replicant_error!(
            ErrorKind::ConfigError,
            "Invalid pipeline configuration",
            err.to_string(),
            source: err
        )
    })
}

/// Everything the workers need, held until streaming starts.
struct Components<S> {
    session: S,
    stage: FilterStage,
    sinks: Vec<Box<dyn Sink>>,
}

struct Workers<S> {
    consume: ConsumeWorkerHandle<S>,
    heartbeat: HeartbeatWorkerHandle,
    filter: FilterWorkerHandle,
    fanout: FanoutWorkerHandle,
}

enum ReplicantState<S> {
    Created(Components<S>),
    Initialized(Components<S>),
    Streaming(Workers<S>),
    Closed,
}

impl<S> ReplicantState<S> {
    fn name(&self) -> &'static str {
        match self {
            ReplicantState::Created(_) => "created",
            ReplicantState::Initialized(_) => "initialized",
            ReplicantState::Streaming(_) => "streaming",
            ReplicantState::Closed => "closed",
        }
    }
}

/// A change data capture pipeline reading one replication slot.
///
/// The pipeline moves through `created → initialized → streaming → closed`:
/// [`Replicant::initialize`] recreates the slot and starts streaming from the position the server
/// reports, [`Replicant::start`] spawns the workers and [`Replicant::close`] stops them and drops the
/// slot.
pub struct Replicant<S> {
    config: Arc<PipelineConfig>,
    decode: DecodeFn,
    tracker: PositionTracker,
    shutdown_tx: ShutdownTx,
    state: ReplicantState<S>,
}

impl<S> Replicant<S>
where
    S: ReplicationSession,
{
    pub fn new(
        config: PipelineConfig,
        session: S,
        decode: DecodeFn,
        stage: FilterStage,
        sinks: Vec<Box<dyn Sink>>,
    ) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            decode,
            tracker: PositionTracker::default(),
            shutdown_tx,
            state: ReplicantState::Created(Components {
                session,
                stage,
                sinks,
            }),
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// The position that heartbeats acknowledge.
    pub fn position(&self) -> Position {
        self.tracker.get()
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Recreates the replication slot and starts streaming from its starting position.
    ///
    /// An existing slot with the configured name is dropped first, so every run starts from a
    /// fresh slot. On failure the pipeline stays in the created state and [`Replicant::close`]
    /// releases the session.
    pub async fn initialize(&mut self) -> ReplicantResult<Position> {
        validate_config(&self.config)?;

        let mut components = match mem::replace(&mut self.state, ReplicantState::Closed) {
            ReplicantState::Created(components) => components,
            state => {
                let name = state.name();
                self.state = state;
                bail!(
                    ErrorKind::InvalidState,
                    "Pipeline already initialized",
                    format!("Initialization requires a created pipeline, it is {name}")
                );
            }
        };

        match self.prepare_slot(&mut components.session).await {
            Ok(position) => {
                self.tracker.advance(position);
                self.state = ReplicantState::Initialized(components);

                info!(
                    slot_name = %self.config.slot_name,
                    %position,
                    "pipeline initialized"
                );

                Ok(position)
            }
            Err(err) => {
                self.state = ReplicantState::Created(components);

                Err(err)
            }
        }
    }

    async fn prepare_slot(&self, session: &mut S) -> ReplicantResult<Position> {
        let slot_name = &self.config.slot_name;

        let exists = match session.slot_exists(slot_name).await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(
                    %slot_name,
                    "failed to check whether the slot exists, assuming it does not: {}", err
                );
                false
            }
        };

        if exists {
            info!(%slot_name, "dropping existing replication slot");
            session.drop_slot(slot_name).await?;
        }

        let start = session
            .create_slot(slot_name, &self.config.output_plugin)
            .await?;

        let result: ReplicantResult<Position> = async {
            let position: Position = start.parse()?;
            session.start_streaming(slot_name, position).await?;

            Ok(position)
        }
        .await;

        // A slot that cannot be streamed from would otherwise retain WAL until the next run.
        if result.is_err()
            && let Err(err) = session.drop_slot(slot_name).await
        {
            error!(%slot_name, "failed to drop the replication slot after a failed start: {}", err);
        }

        result
    }

    /// Spawns the consume, heartbeat, filter and fanout workers.
    ///
    /// Sinks are initialized here, before the first record can reach them.
    pub async fn start(&mut self) -> ReplicantResult<()> {
        // Zero sized queues or intervals would panic inside the workers.
        validate_config(&self.config)?;

        let components = match mem::replace(&mut self.state, ReplicantState::Closed) {
            ReplicantState::Initialized(components) => components,
            state => {
                let name = state.name();
                self.state = state;
                bail!(
                    ErrorKind::InvalidState,
                    "Pipeline not initialized",
                    format!("Streaming requires an initialized pipeline, it is {name}")
                );
            }
        };

        let Components {
            session,
            stage,
            sinks,
        } = components;

        let (batch_tx, batch_rx) = mpsc::channel(self.config.filter_queue_size);
        let (record_tx, record_rx) = mpsc::channel(self.config.fanout_queue_size);
        let (ack_tx, ack_rx) = mpsc::channel(ACK_QUEUE_SIZE);

        let fanout = Fanout::initialize(sinks).await;

        // Workers are started downstream first so that every queue has a consumer before records
        // are produced.
        let fanout = FanoutWorker::new(fanout, record_rx).spawn();
        let filter = FilterWorker::new(stage, batch_rx, record_tx).spawn();
        let consume = ConsumeWorker::new(
            self.config.slot_name.clone(),
            session,
            self.decode.clone(),
            self.tracker.clone(),
            self.config.acknowledge_received,
            batch_tx,
            ack_rx,
            self.shutdown_tx.clone(),
        )
        .spawn();
        let heartbeat = HeartbeatWorker::new(
            Duration::from_millis(self.config.heartbeat_interval_ms),
            self.tracker.clone(),
            ack_tx,
            self.shutdown_tx.subscribe(),
        )
        .spawn();

        self.state = ReplicantState::Streaming(Workers {
            consume,
            heartbeat,
            filter,
            fanout,
        });

        info!(slot_name = %self.config.slot_name, "pipeline streaming");

        Ok(())
    }

    /// Waits for the shutdown signal, fired externally or by a fatal consume error, then closes
    /// the pipeline.
    pub async fn wait(self) -> ReplicantResult<()> {
        if let ReplicantState::Streaming(_) = self.state {
            self.shutdown_tx.subscribe().wait_for_shutdown().await;
        }

        self.close().await
    }

    pub fn shutdown(&self) {
        info!("shutting down the pipeline");
        self.shutdown_tx.shutdown();
    }

    pub async fn shutdown_and_wait(self) -> ReplicantResult<()> {
        self.shutdown();
        self.wait().await
    }

    /// Stops the workers, drops the slot and closes the session.
    ///
    /// The consume worker is stopped first, then the filter and fanout workers drain what was
    /// already forwarded. A failure to drop the slot is logged and reported, since a leaked slot
    /// retains WAL on the source.
    pub async fn close(mut self) -> ReplicantResult<()> {
        let state = mem::replace(&mut self.state, ReplicantState::Closed);
        let slot_name = self.config.slot_name.clone();

        let mut errors: Vec<ReplicantError> = Vec::new();

        let session = match state {
            ReplicantState::Created(components) => Some(components.session),
            ReplicantState::Initialized(mut components) => {
                drop_slot(&mut components.session, &slot_name, &mut errors).await;
                Some(components.session)
            }
            ReplicantState::Streaming(workers) => {
                self.shutdown_tx.shutdown();
                let session = stop_workers(workers, &mut errors).await;

                if let Some(mut session) = session {
                    drop_slot(&mut session, &slot_name, &mut errors).await;
                    Some(session)
                } else {
                    error!(
                        %slot_name,
                        "replication session was lost, the slot must be dropped manually"
                    );
                    None
                }
            }
            ReplicantState::Closed => {
                info!("pipeline already closed");
                return Ok(());
            }
        };

        info!(position = %self.tracker.get(), "final acknowledged position");

        if let Some(mut session) = session {
            session.close().await;
        }

        info!("pipeline closed");

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(())
    }
}

async fn drop_slot<S: ReplicationSession>(
    session: &mut S,
    slot_name: &str,
    errors: &mut Vec<ReplicantError>,
) {
    match session.drop_slot(slot_name).await {
        Ok(()) => info!(%slot_name, "replication slot dropped"),
        Err(err) => {
            error!(%slot_name, "failed to drop the replication slot: {}", err);
            errors.push(err);
        }
    }
}

/// Waits for every worker in dependency order and returns the session if it survived.
async fn stop_workers<S>(workers: Workers<S>, errors: &mut Vec<ReplicantError>) -> Option<S> {
    let Workers {
        consume,
        heartbeat,
        filter,
        fanout,
    } = workers;

    let session = match consume.wait().await {
        Ok(exit) => {
            if let Err(err) = exit.result {
                errors.push(err);
            }
            Some(exit.session)
        }
        Err(err) => {
            errors.push(err);
            None
        }
    };

    if let Err(err) = heartbeat.wait().await {
        errors.push(err);
    }

    // The filter queue closes once the consume worker dropped its sender.
    if let Err(err) = filter.wait().await {
        errors.push(err);
    }

    if let Err(err) = fanout.wait().await {
        errors.push(err);
    }

    session
}
