use serde::Deserialize;

use crate::shared::ValidationError;

const fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

const fn default_queue_size() -> usize {
    64
}

fn default_output_plugin() -> String {
    "wal2json".to_string()
}

fn default_filter_path() -> String {
    "./filter.json".to_string()
}

/// Settings for the streaming pipeline between the replication slot and the sinks.
#[derive(Clone, Debug, Deserialize)]
pub struct PipelineConfig {
    /// Name of the logical replication slot. The slot is dropped and recreated on every start.
    pub slot_name: String,
    /// Name of the logical decoding output plugin the slot is bound to.
    #[serde(default = "default_output_plugin")]
    pub output_plugin: String,
    /// Milliseconds between two standby status updates sent to the server.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Path of the JSON allow-list file.
    #[serde(default = "default_filter_path")]
    pub filter_path: String,
    /// Capacity of the queue between the consume loop and the filter stage.
    #[serde(default = "default_queue_size")]
    pub filter_queue_size: usize,
    /// Capacity of the queue between the filter stage and the fan-out stage.
    #[serde(default = "default_queue_size")]
    pub fanout_queue_size: usize,
    /// When true, the acknowledged position follows the end of every change message handed to
    /// the filter stage instead of staying at the slot's starting position.
    #[serde(default)]
    pub acknowledge_received: bool,
}

impl PipelineConfig {
    /// Builds a config for `slot_name` with every other setting at its default.
    pub fn with_slot_name(slot_name: impl Into<String>) -> Self {
        Self {
            slot_name: slot_name.into(),
            output_plugin: default_output_plugin(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            filter_path: default_filter_path(),
            filter_queue_size: default_queue_size(),
            fanout_queue_size: default_queue_size(),
            acknowledge_received: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        postgres::replication::validate_slot_name(&self.slot_name)?;

        if self.output_plugin.is_empty() {
            return Err(ValidationError::OutputPluginEmpty);
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(ValidationError::HeartbeatIntervalZero);
        }

        if self.filter_queue_size == 0 {
            return Err(ValidationError::QueueSizeZero("filter_queue_size"));
        }

        if self.fanout_queue_size == 0 {
            return Err(ValidationError::QueueSizeZero("fanout_queue_size"));
        }

        Ok(())
    }
}
