//! Distributed mode: server and worker connected through an in-memory broker.

use std::collections::HashSet;

use std::time::Duration;

use futures_util::future::join_all;
use serde_json::Value;
use sws::bridge::{MemoryBroker, Queue};
use sws::lifecycle::Shutdown;

mod common;

use common::Sandbox;

#[tokio::test]
async fn test_responses_return_to_their_connection() {
    let sandbox = Sandbox::new();
    sandbox.install("echo.toml", "echo");
    let broker = MemoryBroker::new();
    let shutdown = Shutdown::new();

    let _worker = common::spawn_worker(sandbox.config(), broker.clone().into(), &shutdown).await;
    let server = common::spawn_server(sandbox.config(), Some(broker.into()), &shutdown).await;
    assert!(server.publisher.is_some());
    let addr = server.local_addr;

    let responses = join_all((0..5).map(|i| async move {
        let body = format!("payload-{i}");
        (body.clone(), common::request(addr, "POST", "/v1/echo/EchoServlet", &body).await)
    }))
    .await;

    let mut correlation_ids = HashSet::new();
    for (sent, response) in responses {
        assert_eq!(response.status, 200);
        let echoed: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(echoed["body"], sent.as_str());

        let header = response.header("x-correlation-id").unwrap().to_string();
        assert_eq!(echoed["correlation_id"], header.as_str());
        correlation_ids.insert(header);
    }
    assert_eq!(correlation_ids.len(), 5);
    assert_eq!(server.publisher.as_ref().unwrap().pending(), 0);
    shutdown.trigger();
}

#[tokio::test]
async fn test_worker_errors_are_relayed() {
    let sandbox = Sandbox::new();
    sandbox.install("echo.toml", "echo");
    let broker = MemoryBroker::new();
    let shutdown = Shutdown::new();

    let _worker = common::spawn_worker(sandbox.config(), broker.clone().into(), &shutdown).await;
    let server = common::spawn_server(sandbox.config(), Some(broker.into()), &shutdown).await;

    let response = common::get(server.local_addr, "/v1/missing/Servlet").await;
    assert_eq!(response.status, 400);
    shutdown.trigger();
}

#[tokio::test]
async fn test_lost_response_queue_fails_fast_without_bans() {
    let sandbox = Sandbox::new();
    sandbox.install("echo.toml", "echo");
    let broker = MemoryBroker::new();
    let shutdown = Shutdown::new();
    let mut config = sandbox.config();
    config.admission.max_requests_per_client = 2;

    let server = common::spawn_server(config, Some(broker.clone().into()), &shutdown).await;
    let publisher = server.publisher.clone().unwrap();
    broker.close(Queue::Responses);
    assert!(common::eventually(|| publisher.is_closed()).await);

    for _ in 0..5 {
        let response = tokio::time::timeout(
            Duration::from_secs(2),
            common::get(server.local_addr, "/v1/echo/EchoServlet"),
        )
        .await
        .expect("request held until its timeout");
        assert_eq!(response.status, 500);
    }
    assert!(server.gate.bans().is_empty());
    shutdown.trigger();
}
