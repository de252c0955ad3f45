use config::shared::ReplicatorConfig;
use replicant::catalog::{PgTableCatalog, TableCatalog};
use replicant::decoding::wal2json_decoder;
use replicant::filter::{AllowList, FilterStage};
use replicant::pipeline::Replicant;
use replicant::replication::{PgReplicationSession, ReplicationSession};
use replicant::sink::build_sinks;
use tracing::{error, info, warn};

use crate::error::ReplicatorResult;

/// Builds every component from the configuration and runs the pipeline until it stops.
pub async fn start_replicator_with_config(config: ReplicatorConfig) -> ReplicatorResult<()> {
    info!(
        slot_name = %config.pipeline.slot_name,
        host = %config.source.host,
        port = config.source.port,
        database = %config.source.name,
        "starting replicator"
    );

    let catalog = PgTableCatalog::new(config.source.clone());
    let mapping = catalog.load_table_mapping().await?;

    let allow_list = AllowList::load(&config.pipeline.filter_path);

    let sinks = build_sinks(&config.sinks)?;
    let session = PgReplicationSession::connect(config.source.clone()).await?;

    let pipeline = Replicant::new(
        config.pipeline,
        session,
        wal2json_decoder(),
        FilterStage::new(mapping, allow_list),
        sinks,
    );

    start_pipeline(pipeline).await
}

/// Initializes and starts the pipeline, then waits for a signal or a fatal error.
async fn start_pipeline<S>(mut pipeline: Replicant<S>) -> ReplicatorResult<()>
where
    S: ReplicationSession,
{
    if let Err(err) = pipeline.initialize().await {
        error!("failed to initialize the pipeline: {}", err);

        if let Err(close_err) = pipeline.close().await {
            warn!("failed to close the pipeline after a failed initialization: {}", close_err);
        }

        return Err(err.into());
    }

    if let Err(err) = pipeline.start().await {
        error!("failed to start the pipeline: {}", err);

        if let Err(close_err) = pipeline.close().await {
            warn!("failed to close the pipeline after a failed start: {}", close_err);
        }

        return Err(err.into());
    }

    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        wait_for_signal().await;
        shutdown_tx.shutdown();
    });

    // Returns once a signal or a fatal consume error fired the shutdown signal.
    let result = pipeline.wait().await;

    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    result?;

    info!("replicator stopped");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!("failed to register the sigterm handler, only ctrl+c stops the pipeline: {}", err);
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down pipeline");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("sigint (ctrl+c) received, shutting down pipeline"),
        Err(err) => {
            error!("failed to listen for ctrl+c: {}", err);
            // Without a signal listener the pipeline runs until it fails.
            std::future::pending::<()>().await;
        }
    }
}
