use std::time::Duration;

use bytes::Bytes;
use replicant::error::ErrorKind;
use replicant::filter::{AllowList, TableMapping};
use replicant::sink::Sink;
use replicant::sink::memory::MemorySink;
use replicant::test_utils::pipeline::{TEST_SLOT_NAME, create_test_pipeline, test_pipeline_config};
use replicant::test_utils::record::{record, wal2json_payload};
use replicant::test_utils::session::DEFAULT_START_POSITION;
use replicant::test_utils::sink::FailingSink;
use replicant::types::{Position, TableName};
use telemetry::tracing::init_test_tracing;

fn partitioned_mapping() -> TableMapping {
    [
        (
            TableName::new("sales", "orders_2024"),
            TableName::new("sales", "orders"),
        ),
        (
            TableName::new("sales", "orders"),
            TableName::new("sales", "orders"),
        ),
        (
            TableName::new("public", "users"),
            TableName::new("public", "users"),
        ),
    ]
    .into_iter()
    .collect()
}

fn start_position() -> Position {
    DEFAULT_START_POSITION.parse().unwrap()
}

#[tokio::test]
async fn records_are_remapped_filtered_and_delivered_in_order() {
    init_test_tracing();

    let sink = MemorySink::new();
    let allow_list = AllowList::new([TableName::new("sales", "orders")]);
    let (mut pipeline, control) = create_test_pipeline(
        test_pipeline_config(),
        partitioned_mapping(),
        Some(allow_list),
        vec![Box::new(sink.clone())],
    );

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.send_change(
        0x1_0000,
        wal2json_payload(&[
            record("sales", "orders_2024", 1),
            record("public", "users", 2),
            record("audit", "unknown", 3),
            record("sales", "orders", 4),
        ]),
    );
    control.send_change(0x2_0000, wal2json_payload(&[record("sales", "orders_2024", 5)]));
    control.send_keepalive(0x2_0000, true);
    control.wait_for_acknowledgements(1).await;

    pipeline.shutdown_and_wait().await.unwrap();

    assert_eq!(
        sink.records().await,
        vec![
            record("sales", "orders", 1),
            record("sales", "orders", 4),
            record("sales", "orders", 5),
        ]
    );
    assert_eq!(sink.init_calls().await, 1);
}

#[tokio::test]
async fn every_mapped_table_passes_without_allow_list() {
    init_test_tracing();

    let sink = MemorySink::new();
    let (mut pipeline, control) = create_test_pipeline(
        test_pipeline_config(),
        partitioned_mapping(),
        None,
        vec![Box::new(sink.clone())],
    );

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.send_change(
        0x1_0000,
        wal2json_payload(&[record("public", "users", 1), record("sales", "orders_2024", 2)]),
    );
    control.send_keepalive(0x1_0000, true);
    control.wait_for_acknowledgements(1).await;

    pipeline.shutdown_and_wait().await.unwrap();

    assert_eq!(
        sink.records().await,
        vec![record("public", "users", 1), record("sales", "orders", 2)]
    );
}

#[tokio::test]
async fn undecodable_message_is_skipped() {
    init_test_tracing();

    let sink = MemorySink::new();
    let (mut pipeline, control) = create_test_pipeline(
        test_pipeline_config(),
        partitioned_mapping(),
        None,
        vec![Box::new(sink.clone())],
    );

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.send_change(0x1_0000, Bytes::from_static(b"{\"change\": [{\"schema\": "));
    control.send_change(0x2_0000, wal2json_payload(&[record("public", "users", 1)]));
    control.send_keepalive(0x2_0000, true);
    control.wait_for_acknowledgements(1).await;

    pipeline.shutdown_and_wait().await.unwrap();

    assert_eq!(sink.records().await, vec![record("public", "users", 1)]);
}

#[tokio::test]
async fn failing_sink_does_not_stop_delivery_to_other_sinks() {
    init_test_tracing();

    let failing = FailingSink::new(ErrorKind::SinkRemoteRejected);
    let sink = MemorySink::new();
    let sinks: Vec<Box<dyn Sink>> = vec![Box::new(failing.clone()), Box::new(sink.clone())];
    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, sinks);

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.send_change(
        0x1_0000,
        wal2json_payload(&[record("public", "users", 1), record("public", "users", 2)]),
    );
    control.send_keepalive(0x1_0000, true);
    control.wait_for_acknowledgements(1).await;

    pipeline.shutdown_and_wait().await.unwrap();

    assert_eq!(failing.write_attempts(), 2);
    assert_eq!(
        sink.records().await,
        vec![record("public", "users", 1), record("public", "users", 2)]
    );
}

#[tokio::test]
async fn keepalive_requesting_reply_is_acknowledged_immediately() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.send_keepalive(0x5_0000, false);
    control.send_keepalive(0x6_0000, true);
    control.wait_for_acknowledgements(1).await;

    pipeline.shutdown_and_wait().await.unwrap();

    // The tracked position is only set when the slot is created.
    let acknowledged = control.acknowledged();
    assert!(!acknowledged.is_empty());
    assert!(acknowledged.iter().all(|position| *position == start_position()));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_acknowledges_on_every_interval() {
    init_test_tracing();

    let mut config = test_pipeline_config();
    config.heartbeat_interval_ms = 1_000;
    let (mut pipeline, control) =
        create_test_pipeline(config, partitioned_mapping(), None, vec![]);

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    let started = tokio::time::Instant::now();
    control.wait_for_acknowledgements(3).await;
    assert!(started.elapsed() >= std::time::Duration::from_secs(3));

    pipeline.shutdown_and_wait().await.unwrap();

    assert!(
        control
            .acknowledged()
            .iter()
            .all(|position| *position == start_position())
    );
}

#[tokio::test]
async fn received_positions_are_acknowledged_when_enabled() {
    init_test_tracing();

    let mut config = test_pipeline_config();
    config.acknowledge_received = true;
    let (mut pipeline, control) =
        create_test_pipeline(config, partitioned_mapping(), None, vec![]);

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.send_change(0x3_0000_0000, wal2json_payload(&[record("public", "users", 1)]));
    control.send_keepalive(0x3_0000_0000, true);
    control.wait_for_acknowledgements(1).await;

    assert_eq!(pipeline.position(), Position::new(0x3_0000_0000));

    pipeline.shutdown_and_wait().await.unwrap();

    assert_eq!(
        control.acknowledged().last(),
        Some(&Position::new(0x3_0000_0000))
    );
}

#[tokio::test]
async fn initialize_recreates_existing_slot() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);
    control.add_existing_slot(TEST_SLOT_NAME);

    let position = pipeline.initialize().await.unwrap();

    assert_eq!(position, start_position());
    assert_eq!(pipeline.position(), start_position());
    assert_eq!(control.dropped_slots(), vec![TEST_SLOT_NAME.to_string()]);
    assert_eq!(control.created_slots(), vec![TEST_SLOT_NAME.to_string()]);
    assert_eq!(
        control.streaming(),
        Some((TEST_SLOT_NAME.to_string(), start_position()))
    );

    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn failed_slot_lookup_is_treated_as_missing_slot() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);
    control.fail_slot_exists();

    pipeline.initialize().await.unwrap();

    assert!(control.dropped_slots().is_empty());
    assert_eq!(control.slots(), vec![TEST_SLOT_NAME.to_string()]);

    pipeline.close().await.unwrap();
}

#[tokio::test]
async fn slot_creation_failure_aborts_initialization() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);
    control.fail_create_slot();

    let err = pipeline.initialize().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReplicationSlotNotCreated);
    assert_eq!(pipeline.state_name(), "created");

    pipeline.close().await.unwrap();
    assert!(control.is_closed());
}

#[tokio::test]
async fn malformed_start_position_aborts_initialization_and_drops_slot() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);
    control.set_start_position("not-a-position");

    let err = pipeline.initialize().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidPosition);
    assert!(control.slots().is_empty());
    assert_eq!(control.streaming(), None);
}

#[tokio::test]
async fn streaming_start_failure_aborts_initialization() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);
    control.fail_start_streaming();

    let err = pipeline.initialize().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReplicationStartFailed);
    assert!(control.slots().is_empty());
}

#[tokio::test]
async fn start_requires_initialized_pipeline() {
    init_test_tracing();

    let (mut pipeline, _control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);

    let err = pipeline.start().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(pipeline.state_name(), "created");
}

#[tokio::test]
async fn close_drops_slot_and_closes_session() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();
    pipeline.shutdown_and_wait().await.unwrap();

    assert!(control.slots().is_empty());
    assert_eq!(control.dropped_slots(), vec![TEST_SLOT_NAME.to_string()]);
    assert!(control.is_closed());
}

#[tokio::test]
async fn slot_drop_failure_is_reported_on_close() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();
    control.fail_drop_slot();

    let err = pipeline.shutdown_and_wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReplicationSlotDropFailed);
    assert!(control.is_closed());
}

#[tokio::test]
async fn read_failure_shuts_down_the_pipeline() {
    init_test_tracing();

    let sink = MemorySink::new();
    let (mut pipeline, control) = create_test_pipeline(
        test_pipeline_config(),
        partitioned_mapping(),
        None,
        vec![Box::new(sink.clone())],
    );

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.send_change(0x1_0000, wal2json_payload(&[record("public", "users", 1)]));
    control.send_read_error(ErrorKind::SourceReadFailed);

    // No external shutdown: the consume worker fires the signal itself.
    let err = pipeline.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceReadFailed);
    assert_eq!(sink.records().await, vec![record("public", "users", 1)]);
    assert!(control.slots().is_empty());
    assert!(control.is_closed());
}

#[tokio::test]
async fn end_of_stream_is_fatal() {
    init_test_tracing();

    let (mut pipeline, control) =
        create_test_pipeline(test_pipeline_config(), partitioned_mapping(), None, vec![]);

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();
    control.end_stream();

    let err = pipeline.wait().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceReadFailed);
}

#[tokio::test]
async fn many_messages_through_full_queues_are_all_delivered_in_order() {
    init_test_tracing();

    let mut config = test_pipeline_config();
    config.filter_queue_size = 1;
    config.fanout_queue_size = 1;
    let sink = MemorySink::new().with_write_delay(Duration::from_millis(2));
    let (mut pipeline, control) = create_test_pipeline(
        config,
        partitioned_mapping(),
        None,
        vec![Box::new(sink.clone())],
    );

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    let mut expected = Vec::new();
    for id in 0..60 {
        let batch = [
            record("sales", "orders_2024", id * 2),
            record("public", "users", id * 2 + 1),
        ];
        expected.push(record("sales", "orders", id * 2));
        expected.push(record("public", "users", id * 2 + 1));

        control.send_change(0x1_0000 + id as u64, wal2json_payload(&batch));
    }
    // Acknowledged only once every change before it was forwarded to the filter stage.
    control.send_keepalive(0x2_0000, true);
    control.wait_for_acknowledgements(1).await;

    pipeline.shutdown_and_wait().await.unwrap();

    assert_eq!(sink.records().await, expected);
}

#[tokio::test(start_paused = true)]
async fn failed_acknowledgement_is_retried_on_next_heartbeat() {
    init_test_tracing();

    let mut config = test_pipeline_config();
    config.heartbeat_interval_ms = 1_000;
    let sink = MemorySink::new();
    let (mut pipeline, control) = create_test_pipeline(
        config,
        partitioned_mapping(),
        None,
        vec![Box::new(sink.clone())],
    );

    pipeline.initialize().await.unwrap();
    pipeline.start().await.unwrap();

    control.fail_acknowledge();
    control.send_keepalive(0x1_0000, true);
    control.wait_for_acknowledge_attempts(1).await;
    assert!(control.acknowledged().is_empty());

    control.wait_for_acknowledgements(1).await;
    assert_eq!(control.acknowledged(), vec![start_position()]);

    control.send_change(0x2_0000, wal2json_payload(&[record("public", "users", 1)]));
    control.send_keepalive(0x2_0000, true);
    control.wait_for_acknowledgements(2).await;

    pipeline.shutdown_and_wait().await.unwrap();

    assert!(control.acknowledge_attempts() >= 3);
    assert_eq!(sink.records().await, vec![record("public", "users", 1)]);
}

#[tokio::test]
async fn zero_sized_queue_is_rejected_before_slot_creation() {
    init_test_tracing();

    let mut config = test_pipeline_config();
    config.fanout_queue_size = 0;
    let (mut pipeline, control) =
        create_test_pipeline(config, partitioned_mapping(), None, vec![]);

    let err = pipeline.initialize().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(control.created_slots().is_empty());

    let err = pipeline.start().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert_eq!(pipeline.state_name(), "created");

    pipeline.close().await.unwrap();
    assert!(control.is_closed());
}
