//! End-to-end tests over the engine socket

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeProvider, Script};
use lancea::config::EngineConfig;
use lancea::engine::Engine;
use lancea::events::EngineEvent;
use lancea::ipc::{self, EngineClient, EngineConnection, Method};
use lancea_model::{Epoch, OutcomeStatus};
use serde_json::json;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Server {
    _temp: TempDir,
    socket_path: PathBuf,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Server {
    fn start() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let socket_path = temp.path().join("lancea").join("engine.sock");
        let (listener, socket_path) = ipc::create_listener_at(&socket_path).expect("Failed to bind socket");

        let engine = Arc::new(
            Engine::builder(EngineConfig::default())
                .provider(Arc::new(FakeProvider::new("echo", Script::Echo)))
                .build(),
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(ipc::serve(listener, engine, shutdown.clone()));

        Self {
            _temp: temp,
            socket_path,
            shutdown,
            handle,
        }
    }

    fn client(&self) -> EngineClient {
        EngineClient::with_socket_path(self.socket_path.clone())
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
        ipc::cleanup_socket(&self.socket_path);
    }
}

/// Read events until an `end` batch for (epoch, provider) arrives
async fn wait_for_end(conn: &mut EngineConnection, epoch: Epoch, provider_id: &str) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Some(event) = conn
        .next_event(Duration::from_secs(5))
        .await
        .expect("Failed to read event")
    {
        let done = matches!(
            &event,
            EngineEvent::ResultsUpdated { epoch: ev, provider_id: p, batch, .. }
                if *ev == epoch && p == provider_id && batch.data.is_end()
        );
        events.push(event);
        if done {
            break;
        }
    }
    events
}

#[tokio::test]
async fn test_ping_over_socket() {
    let server = Server::start();

    let version = server.client().ping().await.expect("Ping failed");
    assert_eq!(version, lancea::VERSION);

    server.stop().await;
}

#[tokio::test]
async fn test_resolve_search_execute_roundtrip() {
    let server = Server::start();
    let mut conn = server.client().connect().await.expect("Failed to connect");

    let resolved = conn.resolve_command("/cmd").await.unwrap();
    assert!(resolved.matched);
    assert_eq!(resolved.provider_id.as_deref(), Some("commands"));

    let epoch = conn.search("/cmd", &["commands".to_string()], Epoch::NONE).await.unwrap();
    assert!(epoch > Epoch::NONE);

    let events = wait_for_end(&mut conn, epoch, "commands").await;
    let keys: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ResultsUpdated { batch, .. } => Some(batch.data.items().to_vec()),
            _ => None,
        })
        .flatten()
        .map(|item| item.key)
        .collect();
    assert!(keys.contains(&"commands:commands".to_string()));

    let outcome = conn.execute("commands", "select", "commands:commands").await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Ok);
    assert_eq!(outcome.data.unwrap()["insertText"], "/commands ");

    server.stop().await;
}

#[tokio::test]
async fn test_every_connection_receives_pushes() {
    let server = Server::start();
    let client = server.client();
    let mut caller = client.connect().await.unwrap();
    let mut watcher = client.connect().await.unwrap();
    // Make sure the watcher's forwarder is subscribed before the search runs
    watcher.ping().await.unwrap();

    let epoch = caller.search("hello", &["echo".to_string()], Epoch::NONE).await.unwrap();

    let seen_by_caller = wait_for_end(&mut caller, epoch, "echo").await;
    let seen_by_watcher = wait_for_end(&mut watcher, epoch, "echo").await;
    assert_eq!(seen_by_caller, seen_by_watcher);
    assert!(seen_by_watcher.iter().any(|e| e.token() == Some(1)));

    server.stop().await;
}

#[tokio::test]
async fn test_cancel_and_execute_unknown_provider() {
    let server = Server::start();
    let mut conn = server.client().connect().await.unwrap();

    let epoch = conn.search("", &[], Epoch::NONE).await.unwrap();
    assert!(conn.cancel(epoch).await.unwrap());
    assert!(!conn.cancel(Epoch(epoch.0 + 10)).await.unwrap());

    let outcome = conn.execute("ghost", "run", "k").await.unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert_eq!(outcome.data.unwrap()["code"], "unknown-provider");

    server.stop().await;
}

#[tokio::test]
async fn test_malformed_params_fail_and_connection_survives() {
    let server = Server::start();
    let mut conn = server.client().connect().await.unwrap();

    // Envelope is valid, payload has the wrong type for `text`
    let err = conn
        .call(Method::Search, json!({"text": 5}))
        .await
        .expect_err("Malformed payload should fail");
    assert!(err.to_string().contains("Engine error"));

    let version = conn.ping().await.unwrap();
    assert_eq!(version, lancea::VERSION);

    server.stop().await;
}
