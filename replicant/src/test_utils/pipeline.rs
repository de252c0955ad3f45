use config::shared::PipelineConfig;

use crate::decoding::wal2json_decoder;
use crate::filter::{AllowList, FilterStage, TableMapping};
use crate::pipeline::Replicant;
use crate::sink::Sink;
use crate::test_utils::session::{MemorySession, MemorySessionControl, memory_session};

pub const TEST_SLOT_NAME: &str = "replicant_test";

/// Pipeline settings with small queues.
///
/// The heartbeat interval is long enough that acknowledgements in a test come from keepalives
/// unless the test shortens it.
pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        heartbeat_interval_ms: 60_000,
        filter_queue_size: 4,
        fanout_queue_size: 4,
        ..PipelineConfig::with_slot_name(TEST_SLOT_NAME)
    }
}

/// Builds a pipeline over an in-memory session using the `wal2json` decoder.
pub fn create_test_pipeline(
    config: PipelineConfig,
    mapping: TableMapping,
    allow_list: Option<AllowList>,
    sinks: Vec<Box<dyn Sink>>,
) -> (Replicant<MemorySession>, MemorySessionControl) {
    let (session, control) = memory_session();
    let pipeline = Replicant::new(
        config,
        session,
        wal2json_decoder(),
        FilterStage::new(mapping, allow_list),
        sinks,
    );

    (pipeline, control)
}
