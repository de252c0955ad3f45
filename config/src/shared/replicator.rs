use serde::Deserialize;

use crate::Config;
use crate::shared::{PgConnectionConfig, PipelineConfig, SinksConfig, ValidationError};

/// Configuration for the replicator service.
///
/// Built once at startup and handed by reference to every component constructor.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    /// Connection to the database whose changes are captured.
    pub source: PgConnectionConfig,
    /// Slot, heartbeat, filter and queue settings.
    pub pipeline: PipelineConfig,
    /// Which sinks receive the change records.
    #[serde(default)]
    pub sinks: SinksConfig,
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl ReplicatorConfig {
    /// Validates the whole configuration, stopping at the first error.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.tls.validate()?;
        self.pipeline.validate()?;
        self.sinks.validate()?;

        Ok(())
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "source": {
            "host": "localhost",
            "port": 5432,
            "name": "app",
            "username": "replicant",
            "password": "secret"
        },
        "pipeline": { "slot_name": "replicant" },
        "sinks": {
            "stdout": { "enabled": true },
            "http": { "enabled": true, "url": "http://localhost:8080/changes" }
        },
        "log_level": "debug"
    }"#;

    #[test]
    fn deserializes_full_config() {
        let config: ReplicatorConfig = serde_json::from_str(CONFIG).unwrap();

        assert_eq!(config.source.host, "localhost");
        assert!(!config.source.tls.enabled);
        assert_eq!(config.pipeline.slot_name, "replicant");
        assert!(config.sinks.stdout.enabled);
        assert_eq!(
            config.sinks.http.url.as_deref(),
            Some("http://localhost:8080/changes")
        );
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_covers_tls() {
        let mut config: ReplicatorConfig = serde_json::from_str(CONFIG).unwrap();
        config.source.tls.enabled = true;

        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        ));
    }
}
