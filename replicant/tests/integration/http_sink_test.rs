use std::time::Duration;

use replicant::error::ErrorKind;
use replicant::sink::Sink;
use replicant::sink::http::HttpSink;
use replicant::sink::stdout::StdoutSink;
use replicant::test_utils::record::record;
use serde_json::json;
use telemetry::tracing::init_test_tracing;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sink_for(server: &MockServer) -> HttpSink {
    HttpSink::new(format!("{}/changes", server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn posts_record_as_json() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/changes"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "Schema": "sales",
            "Table": "orders",
            "Columnnames": ["id"],
            "Columntypes": ["int4"],
            "Columnvalues": [1],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sink = sink_for(&server).await;
    sink.write(&record("sales", "orders", 1)).await.unwrap();
}

#[tokio::test]
async fn non_200_response_is_rejected() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let sink = sink_for(&server).await;
    let err = sink.write(&record("sales", "orders", 1)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SinkRemoteRejected);
    assert!(err.detail().unwrap().contains("unavailable"));

    // The same record still goes through a sink that is up.
    let stdout = StdoutSink::with_writer(Vec::new());
    stdout.write(&record("sales", "orders", 1)).await.unwrap();
}

#[tokio::test]
async fn other_success_statuses_are_rejected() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let sink = sink_for(&server).await;
    let err = sink.write(&record("sales", "orders", 1)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SinkRemoteRejected);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    init_test_tracing();

    // Nothing listens on the discard port.
    let sink = HttpSink::new("http://127.0.0.1:9/changes", Duration::from_secs(1)).unwrap();
    let err = sink.write(&record("sales", "orders", 1)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SinkTransportFailed);
}

#[tokio::test]
async fn sink_name_contains_url() {
    let server = MockServer::start().await;
    let sink = sink_for(&server).await;

    assert_eq!(sink.name(), format!("http({}/changes)", server.uri()));
}
