use std::fs;

use config::shared::ReplicatorConfig;
use config::{LoadConfigError, load_config_from};

const BASE: &str = r#"
source:
  host: localhost
  port: 5432
  name: app
  username: replicant
pipeline:
  slot_name: replicant
  heartbeat_interval_ms: 5000
sinks:
  stdout:
    enabled: true
"#;

#[test]
fn loads_base_configuration() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("base.yaml"), BASE).unwrap();

    let config: ReplicatorConfig = load_config_from(dir.path()).unwrap();

    assert_eq!(config.source.port, 5432);
    assert_eq!(config.pipeline.slot_name, "replicant");
    assert_eq!(config.pipeline.heartbeat_interval_ms, 5000);
    assert_eq!(config.pipeline.output_plugin, "wal2json");
    assert!(config.sinks.stdout.enabled);
    assert!(!config.sinks.http.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn environment_file_overrides_base() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("base.yaml"), BASE).unwrap();
    fs::write(
        dir.path().join("dev.yaml"),
        "sinks:\n  http:\n    enabled: true\n    url: http://localhost:9000/changes\n",
    )
    .unwrap();

    let config: ReplicatorConfig = load_config_from(dir.path()).unwrap();

    assert!(config.sinks.stdout.enabled);
    assert!(config.sinks.http.enabled);
    assert_eq!(
        config.sinks.http.url.as_deref(),
        Some("http://localhost:9000/changes")
    );
}

#[test]
fn missing_base_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();

    let result = load_config_from::<ReplicatorConfig>(dir.path());

    assert!(matches!(
        result,
        Err(LoadConfigError::BaseConfigurationMissing { .. })
    ));
}

#[test]
fn missing_directory_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    let result = load_config_from::<ReplicatorConfig>(&missing);

    assert!(matches!(
        result,
        Err(LoadConfigError::MissingConfigurationDirectory(_))
    ));
}
