//! Transport retry behaviour against the mock server.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tasksync_mock::{MockConfig, MockTaskServer};
use tasksync_transport::{
    LoopbackClient, Method, RequestOptions, Transport, TransportConfig, TransportError,
    IDEMPOTENCY_KEY_HEADER,
};
use tokio::time::Instant;

fn setup(seed: usize) -> (Arc<MockTaskServer>, Transport<LoopbackClient<MockTaskServer>>) {
    let server = Arc::new(MockTaskServer::seeded(seed, MockConfig::instant()));
    let transport = Transport::new(
        TransportConfig::default(),
        LoopbackClient::new(Arc::clone(&server)),
    );
    (server, transport)
}

#[tokio::test(start_paused = true)]
async fn forced_failure_exhausts_after_four_attempts() {
    let (server, transport) = setup(2);
    let started = Instant::now();

    let err = transport
        .get_json::<Value>("/api/tasks", RequestOptions::new().with_query("fail", "500"))
        .await
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(err.status_code(), Some(500));
    assert_eq!(err.body().map(|body| &body[..]), Some(&b"Server Error"[..]));
    assert_eq!(server.request_count(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_then_served() {
    let (server, transport) = setup(3);
    server.inject_failures(429, 2);
    let started = Instant::now();

    let list: Value = transport
        .get_json("/api/tasks", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(list["data"].as_array().unwrap().len(), 3);
    assert_eq!(server.request_count(), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn validation_failure_is_not_retried() {
    let (server, transport) = setup(0);

    let err = transport
        .post_json::<_, Value>("/api/tasks", &json!({ "description": "no title" }))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Status { status: 400, .. }));
    assert!(err.is_client_rejected());
    assert_eq!(server.request_count(), 1);
    assert!(server.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn retried_create_carries_one_idempotency_key() {
    let server = Arc::new(MockTaskServer::seeded(1, MockConfig::instant()));
    let transport = Transport::new(
        TransportConfig::default().with_idempotency_keys(true),
        LoopbackClient::new(Arc::clone(&server)),
    );
    server.inject_failures(500, 1);

    let created: Value = transport
        .post_json("/api/tasks", &json!({ "title": "Once" }))
        .await
        .unwrap();
    assert_eq!(created["id"], 2);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    let first = requests[0].header(IDEMPOTENCY_KEY_HEADER).unwrap();
    assert_eq!(requests[1].header(IDEMPOTENCY_KEY_HEADER), Some(first));
    assert_eq!(requests[0].body, requests[1].body);
}

#[tokio::test(start_paused = true)]
async fn update_of_missing_record_is_not_found() {
    let (server, transport) = setup(1);

    let err = transport
        .patch_json::<_, Value>("/api/tasks/9", &json!({ "status": "completed" }))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    assert_eq!(server.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn delete_succeeds_twice() {
    let (server, transport) = setup(1);

    transport.delete("/api/tasks/1").await.unwrap();
    transport.delete("/api/tasks/1").await.unwrap();

    assert!(server.records().is_empty());
    assert_eq!(server.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_server_times_out_on_every_attempt() {
    let server = Arc::new(MockTaskServer::seeded(
        1,
        MockConfig::instant().with_latency(Duration::from_secs(10), Duration::from_secs(10)),
    ));
    let transport = Transport::new(
        TransportConfig::default().with_timeout(Duration::from_secs(2)),
        LoopbackClient::new(Arc::clone(&server)),
    );

    let err = transport
        .send(Method::Get, "/api/tasks", None, RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        TransportError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last, TransportError::Timeout(_)));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(server.request_count(), 4);
}
